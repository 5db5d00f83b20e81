//! Shared application router builder.
//!
//! [`build_app_router`] is used by both the binary and the integration tests
//! so they run the same middleware stack.

use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::handlers::webhooks::{REQUEST_ID_HEADER, SIGNATURE_HEADER};
use crate::routes;
use crate::state::AppState;

/// Build the full application [`Router`].
///
/// Route groups:
/// - `/health` and `/webhooks/{provider}`: unauthenticated, at the root.
/// - `/api/v1/...`: bearer-token routes, see [`routes::api_routes`].
///
/// Middleware, outermost first:
///
/// 1. CORS
/// 2. Mark `Authorization` and the webhook signature as sensitive
/// 3. Assign `x-request-id` unless the sender supplied one (signed webhooks
///    depend on the sender's value reaching the handler unchanged)
/// 4. Request/response tracing
/// 5. Echo `x-request-id` on the response
/// 6. Request timeout
/// 7. Panic recovery (500 JSON)
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let sensitive = [AUTHORIZATION, HeaderName::from_static(SIGNATURE_HEADER)];

    let public = Router::new()
        .merge(routes::health::router())
        .merge(routes::webhooks::router());

    public
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(SetSensitiveRequestHeadersLayer::new(sensitive))
        .layer(build_cors_layer(config))
        .with_state(state)
}

/// CORS for the admin front end. Provider callbacks are server-to-server and
/// do not rely on it.
///
/// Panics at startup if any configured origin is invalid.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
