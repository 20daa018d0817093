use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Farmer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Farmer => "farmer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "farmer" => Some(Self::Farmer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Warning,
    Expired,
    Suggestion,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Expired => "expired",
            Self::Suggestion => "suggestion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "warning" => Some(Self::Warning),
            "expired" => Some(Self::Expired),
            "suggestion" => Some(Self::Suggestion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub email: bool,
    pub in_app: bool,
    pub days_before_expiry: u32,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            in_app: true,
            days_before_expiry: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub earned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earned_at: Option<DateTime<Utc>>,
}

impl Badge {
    pub fn award(&mut self, at: DateTime<Utc>) -> bool {
        if self.earned {
            return false;
        }
        self.earned = true;
        self.earned_at = Some(at);
        true
    }
}

/// Achievement flags, persisted as a JSON column on the user row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Badges {
    pub zero_waster: Badge,
    pub smart_saver: Badge,
    pub food_hero: Badge,
    pub inventory_master: Badge,
    pub donation_champion: Badge,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FarmerDetails {
    pub full_name: Option<String>,
    pub farming_type: Option<String>,
    /// Comma-separated crop list, as entered.
    pub crops: Option<String>,
    pub farm_size: Option<f64>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub notification_preferences: NotificationPreferences,
    pub badges: Badges,
    pub farmer_details: Option<FarmerDetails>,
    pub location: Option<Location>,
    pub donations_made: u32,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name shown to chat partners and on farmer cards.
    pub fn display_name(&self) -> String {
        if self.first_name.trim().is_empty() {
            self.email
                .split('@')
                .next()
                .unwrap_or(self.email.as_str())
                .to_string()
        } else {
            format!("{} {}", self.first_name, self.last_name)
                .trim_end()
                .to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category: String,
    /// Shelf life in days.
    pub shelf_life: u32,
    pub m_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub is_wasted: bool,
    pub wasted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of a food item taken when it is deleted. Kept so that historical
/// wastage charts still count it until the user clears the period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedFoodItem {
    pub id: Uuid,
    pub original_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category: String,
    pub was_wasted: bool,
    pub wasted_at: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub deleted_at: DateTime<Utc>,
    pub cleared_from_graph: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// The participant of this message who is not `user_id`.
    pub fn counterpart(&self, user_id: Uuid) -> Uuid {
        if self.sender_id == user_id {
            self.recipient_id
        } else {
            self.sender_id
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_item_id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub suggestions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub farmer_id: Uuid,
    pub food_id: Uuid,
    pub food_name: String,
    pub donated_at: DateTime<Utc>,
}
