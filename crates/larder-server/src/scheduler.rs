use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use tracing::{info, warn};

use larder_api::AppState;
use larder_api::notifications::run_expiry_scan;

/// Time left until the next `hour:00` UTC strictly after `now`.
pub fn until_next_run(now: DateTime<Utc>, hour: u32) -> Duration {
    let at = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let mut next = now.date_naive().and_time(at).and_utc();
    if next <= now {
        next += TimeDelta::days(1);
    }
    (next - now).to_std().unwrap_or_default()
}

/// Background task that runs the expiry scan once a day.
pub async fn run_daily_expiry_scan(state: AppState, hour: u32) {
    loop {
        let wait = until_next_run(Utc::now(), hour);
        info!("Next expiry scan in {} min", wait.as_secs() / 60);
        tokio::time::sleep(wait).await;

        match run_expiry_scan(&state).await {
            Ok(stats) => info!(
                "Scheduled expiry scan created {} notification(s)",
                stats.notifications_created
            ),
            Err(e) => warn!("Scheduled expiry scan failed: {:#}", e),
        }
    }
}
