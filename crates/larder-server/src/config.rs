use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing::warn;

use larder_api::mailer::SmtpSettings;

/// Placeholder secrets that are accepted for local development only.
const PLACEHOLDER_JWT_SECRET: &str = "dev-secret-change-me";
const PLACEHOLDER_CRON_KEY: &str = "internal-cron-key";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub cron_key: String,
    /// UTC hour (0-23) at which the daily expiry scan runs.
    pub expiry_scan_hour: u32,
    /// `None` allows any origin.
    pub cors_origin: Option<String>,
    pub clarifai_pat: Option<String>,
    /// `None` logs emails instead of sending them.
    pub smtp: Option<SmtpSettings>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let port = match var("LARDER_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("LARDER_PORT is not a valid port: {raw}"))?,
            None => 5000,
        };

        let expiry_scan_hour = match var("LARDER_EXPIRY_SCAN_HOUR") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("LARDER_EXPIRY_SCAN_HOUR is not a number: {raw}"))?,
            None => 8,
        };
        if expiry_scan_hour > 23 {
            bail!("LARDER_EXPIRY_SCAN_HOUR must be between 0 and 23, got {expiry_scan_hour}");
        }

        let jwt_secret = var("LARDER_JWT_SECRET").unwrap_or_else(|| {
            warn!("LARDER_JWT_SECRET is unset, using the development placeholder");
            PLACEHOLDER_JWT_SECRET.into()
        });
        let cron_key = var("LARDER_CRON_KEY").unwrap_or_else(|| {
            warn!("LARDER_CRON_KEY is unset, using the development placeholder");
            PLACEHOLDER_CRON_KEY.into()
        });

        let smtp = match var("LARDER_SMTP_HOST") {
            Some(host) => {
                let port = match var("LARDER_SMTP_PORT") {
                    Some(raw) => raw
                        .parse()
                        .with_context(|| format!("LARDER_SMTP_PORT is not a valid port: {raw}"))?,
                    None => 587,
                };
                let from = var("LARDER_SMTP_FROM")
                    .context("LARDER_SMTP_FROM is required when LARDER_SMTP_HOST is set")?;
                Some(SmtpSettings {
                    host,
                    port,
                    username: var("LARDER_SMTP_USERNAME"),
                    password: var("LARDER_SMTP_PASSWORD"),
                    from,
                })
            }
            None => None,
        };

        Ok(Self {
            host: var("LARDER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("LARDER_DB_PATH").unwrap_or_else(|| "larder.db".into()).into(),
            jwt_secret,
            cron_key,
            expiry_scan_hour,
            cors_origin: var("LARDER_CORS_ORIGIN"),
            clarifai_pat: var("CLARIFAI_PAT"),
            smtp,
        })
    }
}
