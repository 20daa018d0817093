use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;

use larder_types::api::{Claims, FarmerCard, FarmerSetupRequest};
use larder_types::models::{FarmerDetails, Role, User};

use crate::error::{ApiError, blocking, parse_id};
use crate::extract::AppJson;
use crate::middleware::require_farmer;
use crate::state::AppState;

fn card(user: User) -> FarmerCard {
    FarmerCard {
        id: user.id,
        name: user.display_name(),
        email: user.email.clone(),
        location: user.location,
        farmer_details: user.farmer_details,
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `GET /farmers`, public.
pub async fn list_farmers(State(state): State<AppState>) -> Result<Json<Vec<FarmerCard>>, ApiError> {
    let db = state.db.clone();
    let rows = blocking(move || db.list_farmers()).await?;
    Ok(Json(rows.into_iter().map(|r| card(r.into_user())).collect()))
}

/// `GET /farmers/{id}`, public.
pub async fn get_farmer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FarmerCard>, ApiError> {
    let id = parse_id(&id)?;
    let db = state.db.clone();
    let user = blocking(move || db.get_user_by_id(id))
        .await?
        .filter(|u| u.role == Role::Farmer)
        .ok_or_else(|| ApiError::not_found("Farmer not found"))?;
    Ok(Json(card(user.into_user())))
}

/// `POST /api/farmer/setup`
pub async fn setup(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<FarmerSetupRequest>,
) -> Result<Json<FarmerDetails>, ApiError> {
    require_farmer(&claims)?;
    if req.farm_size.is_some_and(|size| !size.is_finite() || size < 0.0) {
        return Err(ApiError::bad_request("Farm size must be a positive number"));
    }

    let details = FarmerDetails {
        full_name: trimmed(req.full_name),
        farming_type: trimmed(req.farming_type),
        crops: trimmed(req.crops),
        farm_size: req.farm_size,
        country: trimmed(req.country),
        state: trimmed(req.state),
        district: trimmed(req.district),
        updated_at: Some(larder_db::now()),
    };

    let db = state.db.clone();
    let stored = details.clone();
    if !blocking(move || db.update_farmer_details(claims.sub, &stored)).await? {
        return Err(ApiError::not_found("Farmer not found"));
    }
    info!("Farmer profile updated for {}", claims.sub);

    Ok(Json(details))
}

/// `GET /api/farmer/profile`
pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<FarmerCard>, ApiError> {
    require_farmer(&claims)?;
    let db = state.db.clone();
    let user = blocking(move || db.get_user_by_id(claims.sub))
        .await?
        .ok_or_else(|| ApiError::not_found("Farmer not found"))?;
    Ok(Json(card(user.into_user())))
}
