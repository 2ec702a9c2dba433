//! HTTP surface
//!
//! - `POST /api/sfu/token`: end users mint tokens (session bearer)
//! - `/api/sfu/internal/*`: relay nodes verify tokens and manage rooms
//!   (service secret header)

mod middleware;
mod routes;

pub use middleware::SERVICE_SECRET_HEADER;
pub use routes::{
    DeleteRoomRequest, MintRequest, MintResponse, OkResponse, ResolveQuery, VerifyRequest,
    VerifyResponse,
};

use crate::auth::{Secrets, ServiceSecret, TokenIssuer, TokenVerifier};
use crate::config::SfuConfig;
use crate::error::SfuError;
use crate::rooms::RoomRegistry;
use crate::session::SessionAuthenticator;
use crate::storage::KvStore;

use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    issuer: Option<Arc<TokenIssuer>>,
    verifier: Option<Arc<TokenVerifier>>,
    rooms: Arc<RoomRegistry>,
    sessions: Arc<dyn SessionAuthenticator>,
    service_secret: Option<ServiceSecret>,
}

impl AppState {
    pub fn new(
        config: SfuConfig,
        secrets: Secrets,
        store: Arc<dyn KvStore>,
        sessions: Arc<dyn SessionAuthenticator>,
    ) -> Self {
        let config = Arc::new(config);

        if secrets.signing.is_none() {
            warn!("No signing secret configured; token endpoints will answer 503");
        }
        if secrets.service.is_none() {
            warn!("No service secret configured; internal endpoints will answer 503");
        }

        let issuer = secrets
            .signing
            .clone()
            .map(|key| Arc::new(TokenIssuer::new(config.clone(), key, store.clone())));
        let verifier = secrets
            .signing
            .map(|key| Arc::new(TokenVerifier::new(config.clone(), key, store.clone())));

        Self {
            issuer,
            verifier,
            rooms: Arc::new(RoomRegistry::new(config, store)),
            sessions,
            service_secret: secrets.service,
        }
    }

    fn issuer(&self) -> Result<&TokenIssuer, SfuError> {
        self.issuer
            .as_deref()
            .ok_or_else(|| SfuError::Unavailable("token signing is not configured".to_string()))
    }

    fn verifier(&self) -> Result<&TokenVerifier, SfuError> {
        self.verifier
            .as_deref()
            .ok_or_else(|| SfuError::Unavailable("token signing is not configured".to_string()))
    }
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    // The secret check is a route layer so it runs before any body is read
    let internal = Router::new()
        .route("/verify", post(routes::verify_token))
        .route("/rooms/upsert", post(routes::upsert_room))
        .route("/rooms/delete", post(routes::delete_room))
        .route("/rooms/resolve", get(routes::resolve_room))
        .route("/rooms/list", get(routes::list_rooms))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_service_secret,
        ));

    Router::new()
        .route("/api/sfu/token", post(routes::mint_token))
        .nest("/api/sfu/internal", internal)
        .route("/health", get(health_handler))
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Serve until `shutdown` resolves
pub async fn run_server<F>(bind_addr: SocketAddr, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "SFU auth server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("SFU auth server stopped");
    Ok(())
}
