//! Analytics backend for the drop-in website chat widget.
//!
//! The widget posts visitor, chat message and session records to
//! `/analytics`; they are kept in a single JSON document and summarized on
//! request.

pub mod api;
pub mod core;
pub mod middleware;
pub mod models;
pub mod utils;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    routing::get,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::api::analytics::{self, AnalyticsState};
use crate::core::store::AnalyticsStore;

pub fn create_app(store: Arc<AnalyticsStore>) -> Router {
    use crate::middleware::{error_handler, request_id};
    use axum::middleware;

    let allowed_headers: [HeaderName; 2] = [header::CONTENT_TYPE, header::AUTHORIZATION];
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(allowed_headers);

    // CorsLayer only advertises methods and headers on preflight responses;
    // widget clients expect them on every response.
    let allow_methods = SetResponseHeaderLayer::if_not_present(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    let allow_headers = SetResponseHeaderLayer::if_not_present(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );

    // The CORS layer answers every OPTIONS request itself with a 200 and an
    // empty body, so `/analytics` needs no OPTIONS route.
    let analytics_state = AnalyticsState { store };

    let analytics_routes = Router::new()
        .route(
            "/analytics",
            get(analytics::get_analytics)
                .post(analytics::record)
                .delete(analytics::clear)
                .fallback(analytics::method_not_allowed),
        )
        .route(
            "/analytics/report",
            get(analytics::get_report).fallback(analytics::method_not_allowed),
        )
        .with_state(analytics_state);

    Router::new()
        .route("/health", get(health_check))
        .merge(analytics_routes)
        .layer(middleware::from_fn(error_handler::handle_errors))
        .layer(middleware::from_fn(request_id::add_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(error_handler::handle_panic))
        .layer(cors)
        .layer(allow_methods)
        .layer(allow_headers)
}

async fn health_check() -> &'static str {
    "OK"
}
