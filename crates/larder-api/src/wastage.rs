use axum::{
    Extension, Json,
    extract::State,
};
use chrono::Utc;
use tracing::info;

use larder_types::api::{
    BucketQuery, ChartResponse, Claims, ResetRequest, ResetResponse, StatsQuery, StatsResponse,
};
use larder_types::bucket::Bucket;

use crate::error::{ApiError, blocking};
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

/// `GET /wastage/chart?mode=day|month|year&date=YYYY-MM-DD`
pub async fn chart(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppQuery(query): AppQuery<BucketQuery>,
) -> Result<Json<ChartResponse>, ApiError> {
    let bucket = Bucket::from_query(&query.mode, query.date.as_deref())?;
    let db = state.db.clone();
    let counts = blocking(move || db.wastage_by_category(claims.sub, &bucket)).await?;
    Ok(Json(ChartResponse::from_counts(counts)))
}

/// `POST /wastage/reset {mode, date}`. `mode = "all"` clears every waste
/// flag and archived record without touching expiry dates.
pub async fn reset(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<ResetRequest>,
) -> Result<Json<ResetResponse>, ApiError> {
    let db = state.db.clone();

    if req.mode == "all" {
        let outcome = blocking(move || db.reset_all_wastage(claims.sub)).await?;
        info!("{} reset all wastage ({} rows)", claims.sub, outcome.affected());
        return Ok(Json(ResetResponse {
            message: "All wastage data has been reset".into(),
            affected: outcome.affected(),
            verified_cleared: None,
        }));
    }

    let bucket = Bucket::from_query(&req.mode, req.date.as_deref())?;
    let outcome = blocking(move || db.reset_wastage(claims.sub, &bucket)).await?;

    info!(
        "{} reset {} wastage from {} to {}: {} cleared, {} moved, {} archived",
        claims.sub,
        req.mode,
        bucket.start,
        bucket.end,
        outcome.wasted_cleared,
        outcome.expiries_moved,
        outcome.archived_cleared
    );

    Ok(Json(ResetResponse {
        message: format!("Wastage data reset for the selected {}", req.mode),
        affected: outcome.affected(),
        verified_cleared: Some(outcome.remaining_wasted == 0),
    }))
}

/// `GET /wastage/wastage-stats?filter=today|yesterday|month|year|date&specificDate=`
pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppQuery(query): AppQuery<StatsQuery>,
) -> Result<Json<StatsResponse>, ApiError> {
    let bucket = Bucket::for_filter(
        &query.filter,
        query.specific_date.as_deref(),
        Utc::now().date_naive(),
    )?;

    let db = state.db.clone();
    let (total, wasted_by_category) = blocking(move || {
        let total = db.count_created_in(claims.sub, &bucket)?;
        let breakdown = db.wasted_breakdown(claims.sub, &bucket, larder_db::now())?;
        Ok((total, breakdown))
    })
    .await?;

    Ok(Json(StatsResponse {
        total,
        wasted_by_category,
    }))
}
