//! Recur Web Server
//!
//! Axum-based REST API for recurring-transaction detection.
//!
//! The caller is whoever the fronting proxy names in `x-authenticated-user`.
//! Without `--no-auth` a request lacking that header gets 401. Responses carry
//! a same-origin CORS policy and security headers, and internal errors reach
//! clients only as a generic message.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use tower_http::{
    cors::CorsLayer, set_header::SetResponseHeaderLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use recur_core::db::Database;

mod handlers;

/// Header carrying the authenticated caller, set by the fronting proxy
pub const AUTH_USER_HEADER: &str = "x-authenticated-user";

/// Caller used when authentication is disabled
pub const DEFAULT_DEV_USER: &str = "dberg";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Reject requests without the auth header (on unless `--no-auth`)
    pub require_auth: bool,
    /// Extra CORS origins; none means same-origin only
    pub allowed_origins: Vec<String>,
    /// Caller identity used when `require_auth` is off
    pub dev_user: String,
    pub request_timeout: Duration,
    /// Pin the detection clock instead of reading it per request (testing)
    pub fixed_now: Option<DateTime<Utc>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            dev_user: DEFAULT_DEV_USER.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            fixed_now: None,
        }
    }
}

/// Store and config handed to every handler
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
}

impl AppState {
    /// Reference time for the staleness check, read once per request
    pub fn now(&self) -> DateTime<Utc> {
        self.config.fixed_now.unwrap_or_else(Utc::now)
    }
}

/// Caller resolved by the auth middleware
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

/// Resolve the caller for `/api/transactions` and attach it as [`CurrentUser`]
///
/// # Security Notes
///
/// The `x-authenticated-user` header is trusted as-is. Only run with auth
/// enabled behind a proxy that strips and rewrites it.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header_user = request
        .headers()
        .get(AUTH_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let user = match header_user {
        Some(user) => {
            info!(user = %user, path = %request.uri().path(), "Authenticated via header");
            user
        }
        None if !state.config.require_auth => state.config.dev_user.clone(),
        None => {
            warn!(path = %request.uri().path(), "Rejected request without {}", AUTH_USER_HEADER);
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "Authentication required"
                })),
            )
                .into_response();
        }
    };

    request.extensions_mut().insert(CurrentUser(user));
    next.run(request).await
}

/// Build the `/api` router with its auth, timeout, CORS and header layers
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
    });

    let api_routes = Router::new()
        .route(
            "/transactions",
            get(handlers::list_recurring).post(handlers::submit_transactions),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .route("/health", get(handlers::health));

    let cors = if config.allowed_origins.is_empty() {
        // No allow_origin: browsers stay same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ))
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16) -> anyhow::Result<()> {
    serve_with_config(db, host, port, ServerConfig::default()).await
}

/// Bind `host:port` and serve until the process stops
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!(
            dev_user = %config.dev_user,
            "Auth off: callers without {} are served as the dev user",
            AUTH_USER_HEADER
        );
    }

    let app = create_router(db, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Handler error: a status plus the message shown to the client
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn forbidden(msg: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        // Client-caused core errors carry their own message
        match err.downcast_ref::<recur_core::Error>() {
            Some(recur_core::Error::Validation(_)) | Some(recur_core::Error::EmptyBatch) => {
                return Self::bad_request(&err.to_string());
            }
            Some(recur_core::Error::Forbidden(_)) => {
                return Self::forbidden(&err.to_string());
            }
            _ => {}
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred".to_string(),
            // Logged in into_response, never sent
            internal: Some(err),
        }
    }
}
