//! Shared state, router and server startup

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use flashcore::core::config::keys;
use flashcore::{AllowedOrigin, Config, ConfigError, RestStore, StateStore, StoreError, Verifier};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{self, CorsLayer};

use crate::error::ApiError;
use crate::handlers;

/// Shared state for all endpoints
///
/// Built once at startup. Missing configuration leaves the verifier or the
/// store unset; every authenticated call then fails with 500.
#[derive(Clone)]
pub struct AppState {
    verifier: Option<Arc<Verifier>>,
    store: Option<Arc<dyn StateStore>>,
    missing_config: Arc<Vec<&'static str>>,
    #[cfg_attr(not(feature = "dev-identity"), allow(dead_code))]
    dev_identity: bool,
}

/// Verifier and store, available once configuration is complete
pub struct Backend<'a> {
    pub verifier: &'a Verifier,
    pub store: &'a dyn StateStore,
}

impl AppState {
    /// Builds the state from configuration.
    ///
    /// # Arguments
    /// * `config` - Process configuration
    /// * `store` - Store override (in-memory store); the REST store is built from `config` when `None`
    pub fn from_config(config: &Config, store: Option<Arc<dyn StateStore>>) -> Result<Self, StoreError> {
        let mut missing = Vec::new();

        let verifier = match config.bot_token() {
            Ok(token) => Some(Arc::new(Verifier::new(token, config.max_auth_age_secs))),
            Err(_) => {
                missing.push(keys::BOT_TOKEN[0]);
                None
            }
        };

        let store = match store {
            Some(store) => Some(store),
            None => match config.store() {
                Ok(store_config) => Some(Arc::new(RestStore::new(store_config)?) as Arc<dyn StateStore>),
                Err(err) => {
                    if let ConfigError::Missing(keys) = err {
                        missing.extend(keys);
                    }
                    None
                }
            },
        };

        Ok(Self {
            verifier,
            store,
            missing_config: Arc::new(missing),
            dev_identity: config.dev_identity,
        })
    }

    /// Fully configured state
    pub fn new(verifier: Verifier, store: Arc<dyn StateStore>) -> Self {
        Self {
            verifier: Some(Arc::new(verifier)),
            store: Some(store),
            missing_config: Arc::new(Vec::new()),
            dev_identity: false,
        }
    }

    #[cfg(feature = "dev-identity")]
    pub fn with_dev_identity(mut self, enabled: bool) -> Self {
        self.dev_identity = enabled;
        self
    }

    #[cfg(feature = "dev-identity")]
    pub fn dev_identity(&self) -> bool {
        self.dev_identity
    }

    pub fn is_configured(&self) -> bool {
        self.missing_config.is_empty()
    }

    /// Verifier and store, or a configuration error naming what is missing.
    pub fn backend(&self) -> Result<Backend<'_>, ApiError> {
        match (&self.verifier, &self.store) {
            (Some(verifier), Some(store)) => Ok(Backend {
                verifier: verifier.as_ref(),
                store: store.as_ref(),
            }),
            _ => Err(ConfigError::Missing(self.missing_config.to_vec()).into()),
        }
    }
}

/// Creates the API router
pub fn create_router(state: AppState, allowed_origin: &AllowedOrigin) -> Router {
    Router::new()
        .route("/api/progress", any(handlers::progress::handle))
        .route("/api/daily", any(handlers::daily::handle))
        .route("/health", get(health_handler))
        .layer(cors_layer(allowed_origin))
        .layer(middleware::from_fn(preflight_no_content))
        .with_state(state)
}

/// Preflights answered by the CORS layer go out as `204 No Content`.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_preflight = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    let answered_by_cors = response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS);
    if is_preflight && answered_by_cors && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// CORS for the Mini App origin; preflight `OPTIONS` requests are answered here.
fn cors_layer(allowed_origin: &AllowedOrigin) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(cors::Any)
        .max_age(Duration::from_secs(86_400));

    match allowed_origin {
        AllowedOrigin::Any => layer.allow_origin(cors::Any),
        AllowedOrigin::Exact(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => layer.allow_origin(value),
            Err(e) => {
                log::error!("ALLOWED_ORIGIN {:?} is not a valid header value ({}); cross-origin calls will be refused", origin, e);
                layer
            }
        },
    }
}

/// GET /health - liveness probe
async fn health_handler() -> impl IntoResponse {
    "ok"
}

/// Starts the HTTP server
pub async fn run_server(port: u16, state: AppState, allowed_origin: &AllowedOrigin) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = create_router(state, allowed_origin);

    log::info!("Starting flashapi on http://{}", addr);
    log::info!("  /api/progress - progress sync (health, get, push)");
    log::info!("  /api/daily    - daily stats (health, get, push, batch)");
    log::info!("  /health       - liveness");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
