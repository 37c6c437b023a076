//! Route definitions and router setup
//!
//! Configures the login surfaces, the protected per-role route groups, and
//! the global middleware stack.

mod auth;
mod dashboard;

use crate::auth::middleware as auth_middleware;
use crate::auth::RoleName;
use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::{self, Next},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    // Public surface with no session awareness
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/", get(auth::home));

    // Public surface that reads the session (landing redirect, view
    // context, per-portal login/logout). These are swept too, so a
    // corrupted session heals on its next request of any kind.
    let session_aware = Router::new()
        .route("/login", get(auth::generic_login))
        .route("/me", get(auth::view_context))
        .route("/{role}/login", get(auth::show_login).post(auth::login))
        .route("/{role}/logout", post(auth::logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::conflict_sweep,
        ));
    router = router.merge(session_aware);

    // Protected surface: one dashboard group per role
    for role in RoleName::ALL {
        router = router.merge(protected_routes(state.clone(), role));
    }

    // Staff surface shared by several roles; authentication-aware, so the
    // conflict sweep still applies
    let reports = Router::new()
        .route("/reports", get(dashboard::reports))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::conflict_sweep,
        ));
    router = router.merge(reports);

    router.layer(middleware).with_state(state)
}

/// Build one role's protected route group.
///
/// The conflict sweep wraps the role gate, so an inconsistent session is
/// healed before any role check runs.
fn protected_routes(state: SharedState, role: RoleName) -> Router<SharedState> {
    Router::new()
        .route(&format!("/{role}/dashboard"), get(dashboard::show))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            move |state: State<SharedState>, jar: CookieJar, req: Request, next: Next| {
                auth_middleware::role_guard(role, state, jar, req, next)
            },
        ))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth_middleware::conflict_sweep,
        ))
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    }
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
