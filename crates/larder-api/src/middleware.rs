use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};

use larder_types::api::Claims;
use larder_types::models::Role;

use crate::error::ApiError;
use crate::state::AppState;

pub fn decode_token(secret: &str, token: &str) -> jsonwebtoken::errors::Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

fn bearer_token(req: &Request) -> Option<Authorization<Bearer>> {
    req.headers().typed_get::<Authorization<Bearer>>()
}

/// Validate the bearer JWT and make its `Claims` available as an extension.
/// A missing token is 401, a bad or expired one is 403.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = bearer_token(&req)
        .ok_or_else(|| ApiError::Unauthorized("Access token required".into()))?;

    let claims = decode_token(&state.jwt_secret, bearer.token())
        .map_err(|_| ApiError::forbidden("Invalid or expired token"))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Guard for internal scheduler endpoints: the bearer must be the cron key.
pub async fn require_cron_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = bearer_token(&req)
        .ok_or_else(|| ApiError::Unauthorized("Access token required".into()))?;

    if bearer.token() != state.cron_key {
        return Err(ApiError::forbidden("Invalid cron key"));
    }
    Ok(next.run(req).await)
}

pub fn require_farmer(claims: &Claims) -> Result<(), ApiError> {
    match claims.role {
        Role::Farmer => Ok(()),
        Role::User => Err(ApiError::forbidden("Farmer access only")),
    }
}
