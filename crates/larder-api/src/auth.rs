use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use larder_db::models::{NewUser, OtpRow};
use larder_types::api::{
    Claims, LoginRequest, LoginResponse, MeResponse, RegisterRequest, RegisterResponse,
    RequestOtpRequest, ResetPasswordRequest, StatusMessage,
};
use larder_types::models::Role;

use crate::error::{ApiError, blocking};
use crate::extract::AppJson;
use crate::mailer;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;
const TOKEN_TTL: TimeDelta = TimeDelta::days(7);
const OTP_TTL: TimeDelta = TimeDelta::minutes(10);

pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    // Hash password with Argon2id
    let password_hash = hash_password(&req.password)?;
    let role = req.role.unwrap_or_default();
    let first_name = req.first_name.unwrap_or_default().trim().to_string();
    let last_name = req.last_name.unwrap_or_default().trim().to_string();
    let user_id = Uuid::new_v4();

    let db = state.db.clone();
    let lookup = email.clone();
    let created = blocking(move || {
        db.create_user(&NewUser {
            id: user_id,
            email: &lookup,
            password_hash: Some(password_hash.as_str()),
            first_name: &first_name,
            last_name: &last_name,
            role,
            created_at: larder_db::now(),
        })
    })
    .await?;

    if !created {
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let token = create_token(&state.jwt_secret, user_id, &email, role)?;
    info!("Registered {} as {}", email, role.as_str());

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            token,
            message: "User registered successfully".into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();
    let db = state.db.clone();
    let user = blocking(move || db.get_user_by_email(&email))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".into()))?;

    let Some(stored_hash) = user.password_hash.as_deref() else {
        return Err(ApiError::bad_request("Please login with Google"));
    };

    // Verify password
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is invalid: {}", e))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized("Invalid email or password".into()))?;

    let token = create_token(&state.jwt_secret, user.id, &user.email, user.role)?;

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MeResponse>, ApiError> {
    let db = state.db.clone();
    let user = blocking(move || db.get_user_by_id(claims.sub))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(MeResponse {
        id: user.id,
        email: user.email,
        role: user.role,
        first_name: user.first_name,
        last_name: user.last_name,
    }))
}

pub async fn request_otp(
    State(state): State<AppState>,
    AppJson(req): AppJson<RequestOtpRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    let email = req.email.trim().to_lowercase();
    let otp = generate_otp();
    let otp_hash = hash_otp(&otp);
    let expires_at = larder_db::now() + OTP_TTL;

    let db = state.db.clone();
    let lookup = email.clone();
    let known = blocking(move || {
        if db.get_user_by_email(&lookup)?.is_none() {
            return Ok(false);
        }
        db.upsert_otp(&lookup, &otp_hash, expires_at)?;
        Ok(true)
    })
    .await?;

    if !known {
        return Err(ApiError::not_found("User not found"));
    }

    let outbox = state.mailer.clone();
    let to = email.clone();
    blocking(move || outbox.send(&mailer::otp_email(&to, &otp))).await?;
    info!("Password reset code issued for {}", email);

    Ok(Json(StatusMessage::new("OTP sent to your email")))
}

pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(req): AppJson<ResetPasswordRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    let email = req.email.trim().to_lowercase();
    if req.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let db = state.db.clone();
    let lookup = email.clone();
    let record = blocking(move || db.get_otp(&lookup))
        .await?
        .ok_or_else(|| ApiError::bad_request("No OTP requested for this email"))?;

    if let Err(e) = verify_otp(&record, &req.otp, larder_db::now()) {
        warn!("Reset code refused for {}: {}", email, e);
        return Err(e);
    }

    let password_hash = hash_password(&req.new_password)?;
    let db = state.db.clone();
    let updated = blocking(move || {
        let Some(user) = db.get_user_by_email(&email)? else {
            return Ok(false);
        };
        db.update_password(user.id, &password_hash)?;
        db.delete_otp(&email)?;
        Ok(true)
    })
    .await?;

    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(Json(StatusMessage::new("Password reset successful")))
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Please enter a valid email"));
    }
    Ok(email)
}

/// `something@something.something` with no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !local.is_empty() && !host.is_empty() && !tld.is_empty()
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// A code must match the stored digest and be used before it expires.
pub fn verify_otp(record: &OtpRow, code: &str, now: DateTime<Utc>) -> Result<(), ApiError> {
    if record.otp_hash != hash_otp(code.trim()) {
        return Err(ApiError::Unauthorized("Invalid OTP".into()));
    }
    if record.expires_at < now {
        return Err(ApiError::bad_request("OTP has expired"));
    }
    Ok(())
}

fn generate_otp() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

fn hash_otp(otp: &str) -> String {
    hex::encode(Sha256::digest(otp.as_bytes()))
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role,
        exp: (Utc::now() + TOKEN_TTL).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;

    #[test]
    fn email_shape_check() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last@farm.example.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.io"));
        assert!(!is_valid_email("plain"));
    }

    #[test]
    fn otp_is_six_digits_and_hashed() {
        let otp = generate_otp();
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));

        let hash = hash_otp(&otp);
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, otp);
        assert_eq!(hash, hash_otp(&otp));
    }

    fn otp_row(code: &str, expires_at: DateTime<Utc>) -> OtpRow {
        OtpRow {
            email: "a@x.io".into(),
            otp_hash: hash_otp(code),
            expires_at,
        }
    }

    #[test]
    fn otp_checks_code_then_expiry() {
        let now = larder_db::now();
        let live = otp_row("123456", now + OTP_TTL);
        assert!(verify_otp(&live, " 123456 ", now).is_ok());
        assert!(matches!(verify_otp(&live, "654321", now), Err(ApiError::Unauthorized(_))));

        let stale = otp_row("123456", now - TimeDelta::seconds(1));
        match verify_otp(&stale, "123456", now) {
            Err(ApiError::BadRequest(msg)) => assert_eq!(msg, "OTP has expired"),
            other => panic!("expected expiry refusal, got {other:?}"),
        }
        // A wrong code is refused as a mismatch even after expiry
        assert!(matches!(verify_otp(&stale, "000000", now), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn tokens_round_trip_and_reject_other_secrets() {
        let id = Uuid::new_v4();
        let token = create_token("secret", id, "a@x.io", Role::Farmer).unwrap();

        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Farmer);
        assert!(decode_token("other", &token).is_err());
    }
}
