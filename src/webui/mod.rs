pub mod auth;
pub mod error;
pub mod health;
pub mod payments;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::{AppConfig, LinkedInConfig};
use auth::StateStore;
use payments::{BrowserPayments, PaymentsClient, PaymentsError};

/// Long-lived services, each built exactly once before the listener binds.
#[derive(Clone)]
pub struct AppState {
    pub linkedin: LinkedInConfig,
    pub oauth_states: StateStore,
    pub browser_payments: Arc<BrowserPayments>,
    pub payments: Arc<PaymentsClient>,
}

impl AppState {
    pub fn initialize(config: AppConfig) -> Result<Self, PaymentsError> {
        let payments = Arc::new(PaymentsClient::new(&config.server_payments)?);
        let browser_payments = Arc::new(BrowserPayments::new(config.browser_payments));

        Ok(Self {
            linkedin: config.linkedin,
            oauth_states: StateStore::default(),
            browser_payments,
            payments,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes(state.linkedin, state.oauth_states))
        .merge(payments::routes(state.browser_payments, state.payments))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub fn run_server(bind: SocketAddr, config: AppConfig) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(start_server_async(bind, config))
}

/// Validated config in, running server out. Nothing binds if initialisation fails.
pub async fn start_server_async(bind: SocketAddr, config: AppConfig) -> Result<()> {
    let state = AppState::initialize(config)?;
    auth::state_store::spawn_sweeper(state.oauth_states.clone(), auth::state_store::SWEEP_INTERVAL);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Gatehouse listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gatehouse stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{full_env, lookup_in};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        let config = AppConfig::from_lookup(lookup_in(full_env())).unwrap();
        router(AppState::initialize(config).unwrap())
    }

    async fn get(app: Router, uri: &str) -> axum::response::Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_all_routes_mounted() {
        let app = app();
        assert_eq!(get(app.clone(), "/health").await.status(), StatusCode::OK);
        assert_eq!(
            get(app.clone(), "/api/auth/linkedin").await.status(),
            StatusCode::FOUND
        );
        assert_eq!(
            get(app.clone(), "/api/payments/config").await.status(),
            StatusCode::OK
        );
        assert_eq!(
            get(app, "/nope").await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_health_reports_version() {
        let res = get(app(), "/health").await;
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::VERSION);
    }

    #[test]
    fn test_initialize_builds_payments_once() {
        let config = AppConfig::from_lookup(lookup_in(full_env())).unwrap();
        let state = AppState::initialize(config).unwrap();
        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.payments, &cloned.payments));
        assert!(Arc::ptr_eq(
            &state.browser_payments,
            &cloned.browser_payments
        ));
        assert!(!state.browser_payments.is_loaded());
    }
}
