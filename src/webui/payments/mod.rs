//! Payments SDK bootstrap.
//!
//! Two independent pieces share this module: a lazily loaded handle the
//! browser uses to initialise the client-side SDK, and the server-side API
//! client which is built once at startup. Neither processes payments itself.

pub mod browser;
pub mod dto;
pub mod server;

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::config::ConfigError;
use crate::webui::error::ApiResult;

pub use browser::{BrowserPayments, HandleLoader, PaymentHandle, StripeJsLoader};
pub use server::PaymentsClient;

use dto::PaymentsConfigResponse;

#[derive(Debug, thiserror::Error)]
pub enum PaymentsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid credential header: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    #[error("failed to build payments client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to load payments SDK handle: {0}")]
    Load(String),
}

pub struct PaymentsState {
    pub browser: Arc<BrowserPayments>,
    pub server: Arc<PaymentsClient>,
}

pub fn routes(browser: Arc<BrowserPayments>, server: Arc<PaymentsClient>) -> Router {
    let state = Arc::new(PaymentsState { browser, server });
    Router::new()
        .route("/api/payments/config", get(payments_config))
        .with_state(state)
}

/// Public values a browser needs to initialise the payments SDK.
async fn payments_config(
    State(state): State<Arc<PaymentsState>>,
) -> ApiResult<Json<PaymentsConfigResponse>> {
    let handle = state.browser.handle().await?;
    Ok(Json(PaymentsConfigResponse {
        publishable_key: handle.publishable_key.clone(),
        script_url: handle.script_url.clone(),
        price_id: state.server.default_price_id().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrowserPaymentsConfig, ServerPaymentsConfig, DEFAULT_PRICE_ID};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app(publishable_key: &str) -> Router {
        let browser = Arc::new(BrowserPayments::new(BrowserPaymentsConfig {
            publishable_key: publishable_key.to_string(),
        }));
        let server = Arc::new(
            PaymentsClient::new(&ServerPaymentsConfig {
                secret_key: "sk_test_xyz".to_string(),
                price_id: DEFAULT_PRICE_ID.to_string(),
            })
            .unwrap(),
        );
        routes(browser, server)
    }

    async fn get_config(app: Router) -> (StatusCode, serde_json::Value) {
        let res = app
            .oneshot(
                Request::builder()
                    .uri("/api/payments/config")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_config_exposes_only_public_values() {
        let (status, json) = get_config(app("pk_test_abc")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["publishable_key"], "pk_test_abc");
        assert_eq!(json["script_url"], browser::STRIPE_JS_URL);
        assert_eq!(json["price_id"], DEFAULT_PRICE_ID);
        assert!(!json.to_string().contains("sk_test_xyz"));
    }

    #[tokio::test]
    async fn test_config_refuses_secret_in_publishable_slot() {
        let (status, json) = get_config(app("sk_live_oops")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!json.to_string().contains("sk_live_oops"));
    }
}
