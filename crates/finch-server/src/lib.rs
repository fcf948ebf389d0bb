//! Finch Web Server
//!
//! Axum-based REST API in front of the notification engine.
//!
//! Security features:
//! - Bearer authentication with API keys or HS256 JWTs (use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Input validation (pagination limits, preference ranges)
//! - Audit logging for every mutation
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use finch_core::ai::{AIBackend, AIClient};
use finch_core::db::Database;
use finch_core::{EngineConfig, NotificationEngine, PushDispatcher};

mod handlers;
mod scheduler;

pub use scheduler::{run_sweep_pass, start_sweep_scheduler, SweepScheduleConfig, SweepSummary};

/// Maximum pagination limit for notification listings
pub const MAX_PAGE_LIMIT: i64 = 200;

/// Header naming the user an API-key caller acts for
pub const USER_HEADER: &str = "x-finch-user";

/// User assumed when no user header is sent
pub const DEFAULT_USER: &str = "default";

/// Authorization header for bearer auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Longest accepted user id
const MAX_USER_ID_LEN: usize = 128;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys for service callers, sent as "Bearer <key>"
    pub api_keys: Vec<String>,
    /// Shared secret for HS256 JWTs issued by an identity provider
    pub jwt_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
            jwt_secret: None,
        }
    }
}

impl ServerConfig {
    /// Read `FINCH_API_KEYS`, `FINCH_JWT_SECRET`, `FINCH_ALLOWED_ORIGINS`,
    /// and `FINCH_REQUIRE_AUTH`
    pub fn from_env() -> Self {
        let list = |name: &str| -> Vec<String> {
            std::env::var(name)
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default()
        };

        let require_auth = std::env::var("FINCH_REQUIRE_AUTH")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        Self {
            require_auth,
            allowed_origins: list("FINCH_ALLOWED_ORIGINS"),
            api_keys: list("FINCH_API_KEYS"),
            jwt_secret: std::env::var("FINCH_JWT_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub engine: Arc<NotificationEngine>,
    pub config: ServerConfig,
}

/// The authenticated caller, set by the auth middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    /// How the caller authenticated: "jwt", "api-key", or "local-dev"
    pub method: &'static str,
}

/// Authentication middleware - resolves the caller from a JWT, an API key, or
/// (with auth disabled) the user header
///
/// # Security Notes
///
/// **JWT**: the token's `sub` claim is the user id. Signature and expiry are
/// checked against `FINCH_JWT_SECRET`.
///
/// **API keys**: compared in constant time. Key holders are trusted services
/// and act for the user named in `X-Finch-User`.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header_user = user_from_header(request.headers());

    if !state.config.require_auth {
        request.extensions_mut().insert(CurrentUser {
            id: header_user.unwrap_or_else(|| DEFAULT_USER.to_string()),
            method: "local-dev",
        });
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    if let Some(token) = token {
        if validate_api_key(&token, &state.config.api_keys) {
            let id = header_user.unwrap_or_else(|| DEFAULT_USER.to_string());
            info!(user = %id, path = %request.uri().path(), "Authenticated via API key");
            request.extensions_mut().insert(CurrentUser {
                id,
                method: "api-key",
            });
            return next.run(request).await;
        }

        if let Some(secret) = &state.config.jwt_secret {
            match validate_jwt(&token, secret) {
                Ok(id) => {
                    info!(user = %id, path = %request.uri().path(), "Authenticated via JWT");
                    request
                        .extensions_mut()
                        .insert(CurrentUser { id, method: "jwt" });
                    return next.run(request).await;
                }
                Err(e) => {
                    warn!(error = %e, path = %request.uri().path(), "Invalid JWT");
                }
            }
        }
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

fn user_from_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= MAX_USER_ID_LEN)
        .map(str::to_string)
}

/// Validate an HS256 JWT and return its subject
fn validate_jwt(token: &str, secret: &str) -> Result<String, String> {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    #[derive(serde::Deserialize)]
    struct Claims {
        sub: String,
    }

    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| format!("JWT validation failed: {}", e))?;

    let sub = data.claims.sub.trim().to_string();
    if sub.is_empty() || sub.len() > MAX_USER_ID_LEN {
        return Err("JWT subject is not a usable user id".to_string());
    }
    Ok(sub)
}

/// Validate an API key against the configured keys using constant-time comparison
/// to prevent timing attacks.
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();
    valid_keys.iter().any(|key| {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Build a notification engine from `OLLAMA_HOST`/`FINCH_*` settings
pub fn engine_from_env(db: Database) -> NotificationEngine {
    let ai = AIClient::from_env();
    match &ai {
        Some(client) => info!(
            "AI backend configured: {} ({})",
            client.backend_name(),
            client.model()
        ),
        None => info!("ℹ️  AI backend not configured, using notification templates"),
    }

    let engine_config = EngineConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Invalid engine config, using defaults");
        EngineConfig::default()
    });

    let push = PushDispatcher::from_env(db.clone());
    info!(transport = push.transport_name(), "Push delivery configured");

    NotificationEngine::new(db, ai, engine_config).with_push(push)
}

/// Create the application router, building the engine from the environment
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    create_router_with_engine(engine_from_env(db), config)
}

/// Create the application router around an existing engine
pub fn create_router_with_engine(
    engine: impl Into<Arc<NotificationEngine>>,
    config: ServerConfig,
) -> Router {
    let engine = engine.into();
    let state = Arc::new(AppState {
        db: engine.db().clone(),
        engine,
        config: config.clone(),
    });

    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        // Notifications
        .route(
            "/notifications",
            get(handlers::list_notifications).post(handlers::create_notification),
        )
        .route("/notifications/sample", post(handlers::create_sample))
        .route("/notifications/stats", get(handlers::notification_stats))
        .route("/notifications/mark-all-read", post(handlers::mark_all_read))
        .route(
            "/notifications/:id",
            get(handlers::get_notification)
                .patch(handlers::update_notification)
                .delete(handlers::delete_notification),
        )
        // Preferences
        .route(
            "/preferences",
            get(handlers::get_preferences).patch(handlers::update_preferences),
        )
        // Devices
        .route("/devices", post(handlers::register_device))
        .route("/devices/:token", delete(handlers::unregister_device))
        // Finance records
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/budgets",
            get(handlers::list_budgets).post(handlers::upsert_budget),
        )
        .route("/bills", get(handlers::list_bills).post(handlers::create_bill))
        .route("/bills/:id/pay", post(handlers::pay_bill))
        .route("/goals", get(handlers::list_goals).post(handlers::create_goal))
        .route("/goals/:id", patch(handlers::update_goal))
        // Reminder sweeps
        .route("/sweeps/run", post(handlers::run_sweeps))
        // Audit log
        .route("/audit", get(handlers::list_audit_log));

    // Build CORS layer
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let headers = [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        header::HeaderName::from_static(USER_HEADER),
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new().allow_methods(methods).allow_headers(headers)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
    };

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
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
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16) -> anyhow::Result<()> {
    serve_with_config(db, host, port, ServerConfig::from_env()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    } else if config.api_keys.is_empty() && config.jwt_secret.is_none() {
        warn!("⚠️  Authentication required but no FINCH_API_KEYS or FINCH_JWT_SECRET set - every request will be rejected");
    }

    check_ai_connection().await;

    let engine = Arc::new(engine_from_env(db));
    if let Some(sweep_config) = SweepScheduleConfig::from_env() {
        start_sweep_scheduler(engine.clone(), sweep_config);
    }

    let app = create_router_with_engine(engine, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection() {
    match AIClient::from_env() {
        Some(client) => {
            let status = client.status().await;
            if status.healthy {
                info!("✅ AI backend connected: {} ({})", status.host, status.model);
            } else {
                warn!(
                    "⚠️  AI backend configured but not responding: {} - templates will be used",
                    status.host
                );
            }
        }
        None => {
            info!("ℹ️  AI backend not configured (set OLLAMA_HOST to enable AI copy)");
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
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

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
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

        // Caller mistakes keep their message; everything else is opaque
        match err.downcast_ref::<finch_core::Error>() {
            Some(finch_core::Error::InvalidData(msg)) => return Self::bad_request(msg),
            Some(finch_core::Error::NotFound(msg)) => return Self::not_found(msg),
            Some(finch_core::Error::Forbidden(msg)) => return Self::forbidden(msg),
            _ => {}
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
