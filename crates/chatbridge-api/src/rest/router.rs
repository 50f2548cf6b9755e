//! Axum router configuration

use crate::{
    rest::{
        extract::{REQUEST_ID_HEADER, TENANT_HEADER},
        handlers,
    },
    AppState,
};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the bridge router
pub fn create_router(state: AppState) -> Router {
    let token_header = HeaderName::from_bytes(state.token_header.to_ascii_lowercase().as_bytes())
        .unwrap_or_else(|_| HeaderName::from_static("x-n8n-token"));
    let state = Arc::new(state);

    let bridge = Router::new()
        .route("/update_state", post(handlers::update_state))
        .route("/get_state/:channel_id", get(handlers::get_state))
        .route("/chat_response", post(handlers::chat_response))
        .route("/set_typing", post(handlers::set_typing))
        .route("/message", post(handlers::ingest_message));

    // Health check routes (no authentication required)
    let health_routes = Router::new().route("/health", get(handlers::health_check));

    Router::new()
        .nest("/n8n_bridge", bridge)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(token_header)),
        )
        .with_state(state)
}

/// Configure CORS layer
fn cors_layer(token_header: HeaderName) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(
            std::env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .parse::<HeaderValue>()
                .unwrap_or(HeaderValue::from_static("*")),
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
            token_header,
            HeaderName::from_static(TENANT_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .max_age(Duration::from_secs(3600))
}
