//! HTTP transport for the attestation broker.
//!
//! Speaks the metadata-service wire format: every operation is a `POST`
//! to a fixed route with a JSON body of the form
//! `{"principal": "...", "otherValues": [...]}` and answers with
//! `{"message": "..."}` plus a status code.

pub mod api;
pub mod error;
pub mod state;

use std::path::Path;
use std::sync::Arc;

use attest_core::{Broker, BrokerConfig};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use api::router;
pub use error::ServerError;
pub use state::AppState;

/// Load the configuration file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<BrokerConfig, ServerError> {
    match path {
        Some(path) => Ok(BrokerConfig::from_file(path)?),
        None => Ok(BrokerConfig::default()),
    }
}

/// Bind the configured address and serve until the process is stopped.
pub async fn serve(config: BrokerConfig) -> Result<(), ServerError> {
    let state = Arc::new(AppState::new(Broker::from_config(&config)));
    let app = router(state).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&config.listen)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.listen.clone(),
            source,
        })?;
    info!(
        addr = %config.listen,
        resolution = %config.resolution,
        "metadata service listening"
    );

    axum::serve(listener, app).await.map_err(ServerError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, BrokerConfig::default());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(Path::new("/no/such/broker.toml"))).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
