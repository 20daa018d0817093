use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Donation, FarmerDetails, FoodItem, Location, Role};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

/// Plain `{ "message": ... }` acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

// -- Food --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFoodRequest {
    pub name: String,
    pub category: String,
    pub shelf_life: u32,
    pub m_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFoodRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub shelf_life: Option<u32>,
    pub m_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FoodItemResponse {
    pub message: String,
    pub item: FoodItem,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFoodResponse {
    pub message: String,
    pub deleted_item: FoodItem,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodSummary {
    pub total_food: u64,
    pub wasted_food: u64,
    pub remaining_food: u64,
    pub details: FoodSummaryDetails,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodSummaryDetails {
    pub explicitly_wasted: u64,
    pub expired: u64,
    pub deleted_wasted: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasteCounts {
    pub today: u64,
    pub yesterday: u64,
    pub this_month: u64,
    pub this_year: u64,
}

// -- Wastage --

#[derive(Debug, Deserialize)]
pub struct BucketQuery {
    pub mode: String,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub name: String,
    pub value: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChartResponse {
    pub categories: Vec<CategoryCount>,
    pub total: u64,
}

impl ChartResponse {
    pub fn from_counts(categories: Vec<CategoryCount>) -> Self {
        let total = categories.iter().map(|c| c.value).sum();
        Self { categories, total }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub mode: String,
    pub date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub message: String,
    pub affected: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_cleared: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub filter: String,
    pub specific_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total: u64,
    pub wasted_by_category: Vec<CategoryBreakdown>,
}

// -- Notifications --

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryScanStats {
    pub expiring_items: u64,
    pub expired_items: u64,
    pub notifications_created: u64,
    pub emails_sent: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpiryScanResponse {
    pub message: String,
    pub stats: ExpiryScanStats,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    pub text: String,
}

/// One entry of the conversation list: the newest message exchanged with a
/// single counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub partner_id: Uuid,
    pub partner_name: String,
    pub last_message: String,
    pub timestamp: DateTime<Utc>,
    /// True when the caller sent the newest message.
    pub read: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearChatResponse {
    pub message: String,
    pub cleared: u64,
}

// -- Profile --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferencesRequest {
    pub email: Option<bool>,
    pub in_app: Option<bool>,
    pub days_before_expiry: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SaveLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

// -- Farmers --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerSetupRequest {
    pub full_name: Option<String>,
    pub farming_type: Option<String>,
    pub crops: Option<String>,
    pub farm_size: Option<f64>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerCard {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub location: Option<Location>,
    pub farmer_details: Option<FarmerDetails>,
}

// -- Donations --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDonationRequest {
    pub farmer_id: Uuid,
    pub food_id: Uuid,
    pub food_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DonationResponse {
    pub message: String,
    pub donation: Donation,
}

// -- Food recognition --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodAnalysis {
    pub name: String,
    pub category: String,
    pub shelf_life: u32,
    pub storage: String,
}
