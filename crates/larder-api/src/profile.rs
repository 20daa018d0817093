use axum::{Extension, Json, extract::State};
use tracing::info;

use larder_types::api::{Claims, SaveLocationRequest, StatusMessage, UpdatePreferencesRequest};
use larder_types::models::{Location, NotificationPreferences, User};

use crate::error::{ApiError, blocking};
use crate::extract::AppJson;
use crate::notifications::{MAX_WARNING_DAYS, MIN_WARNING_DAYS};
use crate::state::AppState;

/// Apply a partial preferences update on top of the stored values.
pub fn merge_preferences(
    current: NotificationPreferences,
    req: &UpdatePreferencesRequest,
) -> Result<NotificationPreferences, ApiError> {
    let days = req.days_before_expiry.unwrap_or(current.days_before_expiry);
    if !(MIN_WARNING_DAYS..=MAX_WARNING_DAYS).contains(&days) {
        return Err(ApiError::bad_request(format!(
            "daysBeforeExpiry must be between {MIN_WARNING_DAYS} and {MAX_WARNING_DAYS}"
        )));
    }
    Ok(NotificationPreferences {
        email: req.email.unwrap_or(current.email),
        in_app: req.in_app.unwrap_or(current.in_app),
        days_before_expiry: days,
    })
}

pub fn validate_location(req: &SaveLocationRequest) -> Result<Location, ApiError> {
    if !(-90.0..=90.0).contains(&req.latitude) || !(-180.0..=180.0).contains(&req.longitude) {
        return Err(ApiError::bad_request("Invalid coordinates"));
    }
    Ok(Location {
        latitude: req.latitude,
        longitude: req.longitude,
    })
}

/// `GET /user/profile`
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let db = state.db.clone();
    let user = blocking(move || db.get_user_by_id(claims.sub))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user.into_user()))
}

/// `PUT /user/notification-preferences`
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<UpdatePreferencesRequest>,
) -> Result<Json<NotificationPreferences>, ApiError> {
    let db = state.db.clone();
    let current = blocking(move || db.get_user_by_id(claims.sub))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?
        .preferences;

    let prefs = merge_preferences(current, &req)?;
    let db = state.db.clone();
    blocking(move || db.update_preferences(claims.sub, &prefs)).await?;
    info!("{} updated notification preferences", claims.sub);

    Ok(Json(prefs))
}

/// `POST /api/save-location`
pub async fn save_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<SaveLocationRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    let location = validate_location(&req)?;
    let db = state.db.clone();
    if !blocking(move || db.update_location(claims.sub, location)).await? {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(Json(StatusMessage::new("Location saved successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_keeps_unset_fields() {
        let req = UpdatePreferencesRequest {
            in_app: Some(false),
            ..Default::default()
        };
        let prefs = merge_preferences(NotificationPreferences::default(), &req).unwrap();
        assert!(prefs.email);
        assert!(!prefs.in_app);
        assert_eq!(prefs.days_before_expiry, 3);
    }

    #[test]
    fn warning_window_is_bounded() {
        for days in [0, 31] {
            let req = UpdatePreferencesRequest {
                days_before_expiry: Some(days),
                ..Default::default()
            };
            assert!(merge_preferences(NotificationPreferences::default(), &req).is_err());
        }
    }

    #[test]
    fn coordinates_are_range_checked() {
        let ok = SaveLocationRequest { latitude: 12.97, longitude: 77.59 };
        assert_eq!(validate_location(&ok).unwrap().longitude, 77.59);

        let bad = SaveLocationRequest { latitude: 91.0, longitude: 0.0 };
        assert!(validate_location(&bad).is_err());
        let nan = SaveLocationRequest { latitude: f64::NAN, longitude: 0.0 };
        assert!(validate_location(&nan).is_err());
    }
}
