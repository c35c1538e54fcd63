use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use eventhook_core::{ClusterService, DispatchCoordinator, LocalClusterService};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::{auth_middleware, AuthConfig};
use crate::types::*;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cluster: Arc<LocalClusterService>,
    pub coordinator: Arc<DispatchCoordinator>,
    pub auth_config: Arc<AuthConfig>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Create the Axum router with all routes
pub fn create_router(state: AppState) -> Router {
    let auth_config = state.auth_config.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/status", get(status))
        .route("/api/v1/cluster/state", post(publish_state))
        .route("/api/v1/hooks/enabled", put(set_hooks_enabled))
        .layer(middleware::from_fn(move |req, next| {
            auth_middleware(auth_config.clone(), req, next)
        }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until Ctrl+C
pub async fn start_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let router = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!(addr = %addr, "Starting gateway server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let cluster = state.cluster.state();
    Json(StatusResponse {
        cluster_name: cluster.cluster_name.clone(),
        state_version: cluster.version,
        is_master: state.coordinator.state().is_master(),
        hooks_enabled: state.coordinator.hooks_enabled(),
        local_node: cluster.nodes.local_node().cloned(),
    })
}

/// Apply a published cluster state; hooks run in the background
async fn publish_state(
    State(state): State<AppState>,
    Json(req): Json<PublishStateRequest>,
) -> Result<(StatusCode, Json<PublishStateResponse>), ApiError> {
    match state.cluster.publish(req.source, req.state).await {
        Ok(applied) => Ok((
            StatusCode::ACCEPTED,
            Json(PublishStateResponse {
                version: applied.version,
                accepted_at: chrono::Utc::now().to_rfc3339(),
            }),
        )),
        Err(e) => {
            error!(error = %e, "Failed to apply published cluster state");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("{:#}", e),
                }),
            ))
        }
    }
}

async fn set_hooks_enabled(
    State(state): State<AppState>,
    Json(req): Json<HooksEnabledRequest>,
) -> Json<HooksEnabledResponse> {
    state.coordinator.set_hooks_enabled(req.enabled);
    Json(HooksEnabledResponse {
        enabled: req.enabled,
    })
}
