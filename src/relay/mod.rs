//! HTTP relay between terminal or browser callers and Mayan EDMS.
//!
//! The relay keeps no session store. Callers present their token on every
//! request and the relay forwards it upstream.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub mod error;
pub mod mayan;
pub mod query;
pub mod routes;
pub mod state;


use routes::{
    documents_handler, health_handler, last_state_documents_handler, login_handler,
    logout_handler, metadata_types_handler, workflow_documents_handler, workflow_states_handler,
};
use state::RelayState;

use crate::{config::RelayConfig, domain::BoardError};

pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/documents", get(documents_handler))
        .route("/workflow_templates/{template}/states", get(workflow_states_handler))
        .route(
            "/workflow_templates/{template}/states/{state}/documents",
            get(workflow_documents_handler),
        )
        .route(
            "/workflow_templates/{template}/last_state/documents",
            get(last_state_documents_handler),
        )
        .route("/metadata_types", get(metadata_types_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: RelayConfig) -> Result<(), BoardError> {
    info!("Relaying to {}", config.mayan_url);
    let address = format!("0.0.0.0:{}", config.port);
    let app = router(RelayState::new(config));

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Relay running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Relay shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
