//! Database row types that carry more (or differently shaped) data than the
//! shared models in `larder-types`. Tables that map one-to-one onto a shared
//! model are read straight into that model.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use larder_types::models::{
    Badges, FarmerDetails, FoodItem, Location, NotificationPreferences, Role, User,
};

pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    /// `None` for accounts created by an external identity provider.
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub preferences: NotificationPreferences,
    pub badges: Badges,
    pub farmer_details: Option<FarmerDetails>,
    pub location: Option<Location>,
    pub donations_made: u32,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role: self.role,
            notification_preferences: self.preferences,
            badges: self.badges,
            farmer_details: self.farmer_details,
            location: self.location,
            donations_made: self.donations_made,
            created_at: self.created_at,
        }
    }
}

pub struct NewUser<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub password_hash: Option<&'a str>,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

pub struct OtpRow {
    pub email: String,
    pub otp_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// A live, non-wasted food item joined with its owner's contact settings.
pub struct ExpiryCandidate {
    pub item: FoodItem,
    pub owner_email: String,
    pub preferences: NotificationPreferences,
}

/// Rows touched by a wastage reset, per table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WastageReset {
    pub wasted_cleared: u64,
    pub expiries_moved: u64,
    pub archived_cleared: u64,
    /// Wasted items still counted in the window after the reset.
    pub remaining_wasted: u64,
}

impl WastageReset {
    pub fn affected(&self) -> u64 {
        self.wasted_cleared + self.expiries_moved + self.archived_cleared
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FoodTotals {
    pub total: u64,
    pub explicitly_wasted: u64,
    pub expired: u64,
    pub deleted_wasted: u64,
}

/// Donor-side counters after a donation is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DonationOutcome {
    pub donations_made: u32,
    pub badge_awarded: bool,
}
