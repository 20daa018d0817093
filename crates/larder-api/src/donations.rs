use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use larder_types::api::{Claims, CreateDonationRequest, DonationResponse};
use larder_types::models::{Donation, Role};

use crate::error::{ApiError, blocking};
use crate::extract::AppJson;
use crate::state::AppState;

/// Donations needed for the donation-champion badge.
pub const CHAMPION_THRESHOLD: u32 = 5;

enum Refusal {
    NoFarmer,
    NoFood,
}

/// `POST /donations`
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<CreateDonationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.farmer_id == claims.sub {
        return Err(ApiError::bad_request("You cannot donate to yourself"));
    }

    let donor_id = claims.sub;
    let db = state.db.clone();
    let result = blocking(move || {
        let is_farmer = db
            .get_user_by_id(req.farmer_id)?
            .is_some_and(|u| u.role == Role::Farmer);
        if !is_farmer {
            return Ok(Err(Refusal::NoFarmer));
        }
        let Some(item) = db.get_food(donor_id, req.food_id)? else {
            return Ok(Err(Refusal::NoFood));
        };

        let food_name = match req.food_name.trim() {
            "" => item.name,
            name => name.to_string(),
        };
        let donation = Donation {
            id: Uuid::new_v4(),
            donor_id,
            farmer_id: req.farmer_id,
            food_id: item.id,
            food_name,
            donated_at: larder_db::now(),
        };
        let outcome = db.record_donation(&donation, CHAMPION_THRESHOLD)?;
        Ok(Ok((donation, outcome)))
    })
    .await?;

    let (donation, outcome) = match result {
        Ok(recorded) => recorded,
        Err(Refusal::NoFarmer) => return Err(ApiError::not_found("Farmer not found")),
        Err(Refusal::NoFood) => return Err(ApiError::not_found("Food item not found")),
    };

    info!(
        "{} donated {} to {} ({} total)",
        donor_id, donation.food_name, donation.farmer_id, outcome.donations_made
    );

    let message = if outcome.badge_awarded {
        info!("{} earned the donation champion badge", donor_id);
        "Donation recorded. You earned the Donation Champion badge!"
    } else {
        "Donation recorded"
    };

    Ok((
        StatusCode::CREATED,
        Json(DonationResponse {
            message: message.into(),
            donation,
        }),
    ))
}

/// `GET /donations`: made by or to the caller, newest first.
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Donation>>, ApiError> {
    let db = state.db.clone();
    Ok(Json(blocking(move || db.list_donations(claims.sub)).await?))
}
