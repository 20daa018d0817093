pub mod config;
pub mod scheduler;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use larder_api::middleware::{require_auth, require_cron_key};
use larder_api::{
    AppState, auth, donations, farmers, food, messages, notifications, profile, vision, wastage,
};
use larder_gateway::connection;

/// Assemble every route. `cors_origin = None` allows any origin.
pub fn build_router(state: AppState, cors_origin: Option<&str>) -> anyhow::Result<Router> {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/request-otp", post(auth::request_otp))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/farmers", get(farmers::list_farmers))
        .route("/farmers/{id}", get(farmers::get_farmer));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        // Food
        .route("/food", get(food::list_food))
        .route("/food/add", post(food::add_food))
        .route("/food/summary", get(food::summary))
        .route("/food/inventory", get(food::inventory))
        .route("/food/wastage/stats", get(food::waste_counts))
        .route("/food/mark-wasted/{id}", post(food::mark_wasted))
        .route("/food/{id}", put(food::update_food).delete(food::delete_food))
        // Wastage
        .route("/wastage/chart", get(wastage::chart))
        .route("/wastage/reset", post(wastage::reset))
        .route("/wastage/wastage-stats", get(wastage::stats))
        .route("/wastage/mark-wasted/{id}", post(food::mark_wasted))
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route("/notifications/{id}/read", put(notifications::mark_read))
        .route("/notifications/{id}", delete(notifications::delete))
        // Messages
        .route("/messages", post(messages::send))
        .route("/messages/conversations", get(messages::conversations))
        .route("/messages/clear/{id}", delete(messages::clear))
        .route("/messages/{id}", get(messages::conversation).delete(messages::delete))
        // Profile, farmers, donations
        .route("/user/profile", get(profile::get_profile))
        .route("/user/notification-preferences", put(profile::update_preferences))
        .route("/api/save-location", post(profile::save_location))
        .route("/api/farmer/setup", post(farmers::setup))
        .route("/api/farmer/profile", get(farmers::profile))
        .route("/donations", post(donations::create).get(donations::list))
        .route(
            "/ai/analyze",
            post(vision::analyze).layer(DefaultBodyLimit::max(vision::MAX_IMAGE_BYTES)),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cron_routes = Router::new()
        .route("/notifications/check-expiry", post(notifications::check_expiry))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_cron_key));

    let ws_route = Router::new().route("/gateway", get(ws_upgrade));

    let cors = match cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]),
        None => CorsLayer::permissive(),
    };

    Ok(Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(cron_routes)
        .merge(ws_route)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(
            socket,
            state.dispatcher.clone(),
            state.db.clone(),
            state.jwt_secret.clone(),
        )
    })
}
