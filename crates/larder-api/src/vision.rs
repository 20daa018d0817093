use axum::{Extension, Json, body::Bytes, extract::State};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use larder_types::api::{Claims, FoodAnalysis};

use crate::error::ApiError;
use crate::state::AppState;

/// Public food-item-recognition model on Clarifai.
pub const CLARIFAI_FOOD_MODEL_URL: &str =
    "https://api.clarifai.com/v2/users/clarifai/apps/main/models/food-item-recognition/outputs";

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct VisionClient {
    http: Client,
    pat: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct OutputsResponse {
    #[serde(default)]
    outputs: Vec<Output>,
}

#[derive(Debug, Deserialize)]
struct Output {
    data: Option<OutputData>,
}

#[derive(Debug, Deserialize)]
struct OutputData {
    #[serde(default)]
    concepts: Vec<Concept>,
}

#[derive(Debug, Deserialize)]
struct Concept {
    name: String,
}

impl VisionClient {
    pub fn new(pat: String) -> Self {
        Self::with_endpoint(pat, CLARIFAI_FOOD_MODEL_URL.to_string())
    }

    pub fn with_endpoint(pat: String, endpoint: String) -> Self {
        Self {
            http: Client::new(),
            pat,
            endpoint,
        }
    }

    /// Name of the model's most confident concept for the image, if any.
    pub async fn top_concept(&self, image: &[u8]) -> anyhow::Result<Option<String>> {
        let body = json!({
            "inputs": [{ "data": { "image": { "base64": B64.encode(image) } } }]
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Key {}", self.pat))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Clarifai API error ({}): {}", status, text);
        }

        let parsed: OutputsResponse = resp.json().await?;
        Ok(parsed
            .outputs
            .into_iter()
            .next()
            .and_then(|o| o.data)
            .and_then(|d| d.concepts.into_iter().next())
            .map(|c| c.name))
    }
}

pub fn unknown_food() -> FoodAnalysis {
    FoodAnalysis {
        name: "Unknown".into(),
        category: "Unknown".into(),
        shelf_life: 0,
        storage: "Unknown".into(),
    }
}

/// Keyword rules mapping a recognised food name to a category, a default
/// shelf life in days, and a storage hint. First match wins.
const RULES: &[(&[&str], &str, u32, &str)] = &[
    (
        &["apple", "banana", "orange", "mango", "tomato", "grape", "strawberry"],
        "Fruits",
        5,
        "Cool Dry Place",
    ),
    (
        &["carrot", "onion", "potato", "cabbage", "spinach", "broccoli"],
        "Vegetables",
        7,
        "Refrigerated",
    ),
    (&["milk", "cheese", "yogurt", "butter", "cream"], "Dairy", 6, "Refrigerated"),
    (&["bread", "rice", "pasta", "noodle", "cereal"], "Grains", 3, "Cool Dry Place"),
    (&["chicken", "fish", "meat", "beef", "pork", "egg"], "Meat", 2, "Frozen"),
    (&["water", "juice", "soda", "tea", "coffee"], "Beverages", 10, "Room Temperature"),
];

pub fn classify_food(name: &str) -> FoodAnalysis {
    let lower = name.to_lowercase();
    let rule = RULES
        .iter()
        .find(|(keywords, ..)| keywords.iter().any(|k| lower.contains(k)));

    match rule {
        Some((_, category, shelf_life, storage)) => FoodAnalysis {
            name: name.to_string(),
            category: category.to_string(),
            shelf_life: *shelf_life,
            storage: storage.to_string(),
        },
        None => FoodAnalysis {
            name: name.to_string(),
            ..unknown_food()
        },
    }
}

/// `POST /ai/analyze` with the raw image as the request body.
pub async fn analyze(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    image: Bytes,
) -> Result<Json<FoodAnalysis>, ApiError> {
    let vision = state
        .vision
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Image analysis is not configured".into()))?;

    if image.is_empty() {
        return Err(ApiError::bad_request("No image uploaded"));
    }
    if image.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::bad_request("Image is larger than 10 MB"));
    }

    let analysis = match vision.top_concept(&image).await {
        Ok(Some(name)) => classify_food(&name),
        Ok(None) => {
            warn!("Clarifai returned no predictions for {}", claims.sub);
            unknown_food()
        }
        Err(e) => {
            warn!("Food recognition failed for {}: {:#}", claims.sub, e);
            unknown_food()
        }
    };

    info!("Food identified for {}: {} ({})", claims.sub, analysis.name, analysis.category);
    Ok(Json(analysis))
}
