use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeDelta, Utc};
use tracing::info;
use uuid::Uuid;

use larder_types::api::{
    AddFoodRequest, BucketQuery, ChartResponse, Claims, DeleteFoodResponse, FoodItemResponse,
    FoodSummary, FoodSummaryDetails, UpdateFoodRequest, WasteCounts,
};
use larder_types::bucket::{Bucket, BucketMode, is_storable};
use larder_types::models::FoodItem;

use crate::error::{ApiError, blocking, parse_id};
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

/// Expiry is midnight UTC of the manufacture date plus the shelf life.
pub fn expiry_for(m_date: NaiveDate, shelf_life: u32) -> Result<DateTime<Utc>, ApiError> {
    if !is_storable(m_date) {
        return Err(ApiError::bad_request("Manufacture date is out of range"));
    }
    m_date
        .checked_add_days(Days::new(u64::from(shelf_life)))
        .filter(|d| is_storable(*d))
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .ok_or_else(|| ApiError::bad_request("Shelf life is out of range"))
}

fn midnight(d: NaiveDate) -> DateTime<Utc> {
    d.and_time(NaiveTime::MIN).and_utc()
}

fn required(value: &str, field: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(value.to_string())
}

pub async fn add_food(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<AddFoodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = larder_db::now();
    let item = FoodItem {
        id: Uuid::new_v4(),
        user_id: claims.sub,
        name: required(&req.name, "Name")?,
        category: required(&req.category, "Category")?,
        shelf_life: req.shelf_life,
        m_date: midnight(req.m_date),
        expiry_date: expiry_for(req.m_date, req.shelf_life)?,
        is_wasted: false,
        wasted_at: None,
        created_at: now,
    };

    let db = state.db.clone();
    let stored = item.clone();
    blocking(move || db.insert_food(&stored)).await?;
    info!("{} added {} ({})", claims.sub, item.name, item.id);

    Ok((
        StatusCode::CREATED,
        Json(FoodItemResponse {
            message: "Food item added".into(),
            item,
        }),
    ))
}

pub async fn list_food(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<FoodItem>>, ApiError> {
    let db = state.db.clone();
    let items = blocking(move || db.list_food(claims.sub)).await?;
    Ok(Json(items))
}

pub async fn update_food(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateFoodRequest>,
) -> Result<Json<FoodItemResponse>, ApiError> {
    let id = parse_id(&id)?;
    let db = state.db.clone();
    let mut item = blocking(move || db.get_food(claims.sub, id))
        .await?
        .ok_or_else(|| ApiError::not_found("Food item not found"))?;

    if let Some(name) = req.name.as_deref() {
        item.name = required(name, "Name")?;
    }
    if let Some(category) = req.category.as_deref() {
        item.category = required(category, "Category")?;
    }
    if req.shelf_life.is_some() || req.m_date.is_some() {
        let m_date = req.m_date.unwrap_or_else(|| item.m_date.date_naive());
        item.shelf_life = req.shelf_life.unwrap_or(item.shelf_life);
        item.m_date = midnight(m_date);
        item.expiry_date = expiry_for(m_date, item.shelf_life)?;
    }

    let db = state.db.clone();
    let stored = item.clone();
    let updated = blocking(move || db.update_food(&stored)).await?;
    if !updated {
        return Err(ApiError::not_found("Food item not found"));
    }

    Ok(Json(FoodItemResponse {
        message: "Food item updated".into(),
        item,
    }))
}

/// Archive the item into the deleted-items table and remove it.
pub async fn delete_food(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<DeleteFoodResponse>, ApiError> {
    let id = parse_id(&id)?;
    let db = state.db.clone();
    let deleted = blocking(move || db.archive_food(claims.sub, id, Uuid::new_v4(), larder_db::now()))
        .await?
        .ok_or_else(|| ApiError::not_found("Food item not found"))?;

    info!("{} deleted {} (wasted: {})", claims.sub, deleted.id, deleted.is_wasted);

    Ok(Json(DeleteFoodResponse {
        message: "Food item deleted".into(),
        deleted_item: deleted,
    }))
}

pub async fn mark_wasted(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<FoodItemResponse>, ApiError> {
    let id = parse_id(&id)?;
    let db = state.db.clone();
    let item = blocking(move || db.mark_wasted(claims.sub, id, larder_db::now()))
        .await?
        .ok_or_else(|| ApiError::not_found("Food item not found"))?;

    Ok(Json(FoodItemResponse {
        message: "Food item marked as wasted".into(),
        item,
    }))
}

pub async fn summary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<FoodSummary>, ApiError> {
    let db = state.db.clone();
    let totals = blocking(move || db.food_totals(claims.sub, larder_db::now())).await?;

    let wasted = totals.explicitly_wasted + totals.expired;
    Ok(Json(FoodSummary {
        total_food: totals.total,
        wasted_food: wasted,
        remaining_food: totals.total.saturating_sub(wasted),
        details: FoodSummaryDetails {
            explicitly_wasted: totals.explicitly_wasted,
            expired: totals.expired,
            deleted_wasted: totals.deleted_wasted,
        },
    }))
}

/// Category counts of items in stock during the requested window.
pub async fn inventory(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppQuery(query): AppQuery<BucketQuery>,
) -> Result<Json<ChartResponse>, ApiError> {
    let bucket = Bucket::from_query(&query.mode, query.date.as_deref())?;
    let db = state.db.clone();
    let counts = blocking(move || db.inventory_by_category(claims.sub, &bucket)).await?;
    Ok(Json(ChartResponse::from_counts(counts)))
}

/// How many items were marked wasted today, yesterday, this month and this year.
pub async fn waste_counts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<WasteCounts>, ApiError> {
    let today = Utc::now().date_naive();
    let yesterday = today.pred_opt().unwrap_or(today);
    let windows = [
        Bucket::resolve(BucketMode::Day, today)?,
        Bucket::resolve(BucketMode::Day, yesterday)?,
        Bucket::resolve(BucketMode::Month, today)?,
        Bucket::resolve(BucketMode::Year, today)?,
    ];

    let db = state.db.clone();
    let counts = blocking(move || {
        windows
            .iter()
            .map(|b| db.count_wasted_between(claims.sub, b.start, b.end + TimeDelta::milliseconds(1)))
            .collect::<anyhow::Result<Vec<u64>>>()
    })
    .await?;

    Ok(Json(WasteCounts {
        today: counts[0],
        yesterday: counts[1],
        this_month: counts[2],
        this_year: counts[3],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_manufacture_plus_shelf_life() {
        let m = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let expiry = expiry_for(m, 3).unwrap();
        assert_eq!(expiry.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(expiry_for(m, 0).unwrap(), midnight(m));
    }

    #[test]
    fn expiry_must_stay_within_four_digit_years() {
        let last = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap();
        assert!(expiry_for(last, 0).is_ok());
        assert!(matches!(expiry_for(last, 5), Err(ApiError::BadRequest(_))));

        let far = NaiveDate::from_ymd_opt(10_000, 1, 1).unwrap();
        assert!(matches!(expiry_for(far, 0), Err(ApiError::BadRequest(_))));
        let early = NaiveDate::from_ymd_opt(-1, 12, 31).unwrap();
        assert!(matches!(expiry_for(early, 5), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(required("  ", "Name").is_err());
        assert_eq!(required(" Kale ", "Name").unwrap(), "Kale");
    }
}
