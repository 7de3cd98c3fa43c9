use std::fmt;

use http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use tracing::info;

use crate::config::ServerPaymentsConfig;

use super::PaymentsError;

pub use crate::config::DEFAULT_PRICE_ID;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";
/// Pinned so payloads keep their shape regardless of the account default.
pub const STRIPE_API_VERSION: &str = "2023-10-16";

const STRIPE_VERSION_HEADER: HeaderName = HeaderName::from_static("stripe-version");

/// Server-side payments API client. Built once at startup and shared.
pub struct PaymentsClient {
    http: reqwest::Client,
    base_url: String,
    price_id: String,
}

impl PaymentsClient {
    pub fn new(config: &ServerPaymentsConfig) -> Result<Self, PaymentsError> {
        Self::with_base_url(config, STRIPE_API_BASE)
    }

    pub fn with_base_url(
        config: &ServerPaymentsConfig,
        base_url: &str,
    ) -> Result<Self, PaymentsError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.secret_key))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            STRIPE_VERSION_HEADER,
            HeaderValue::from_static(STRIPE_API_VERSION),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("gatehouse/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!(
            api_version = STRIPE_API_VERSION,
            price_id = %config.price_id,
            "Payments client initialised"
        );

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            price_id: config.price_id.clone(),
        })
    }

    pub fn default_price_id(&self) -> &str {
        &self.price_id
    }

    /// Start an authenticated request against the API; `path` is relative to
    /// the base URL. Payment operations are built on this.
    pub fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.http.request(method, url)
    }
}

impl fmt::Debug for PaymentsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentsClient")
            .field("base_url", &self.base_url)
            .field("api_version", &STRIPE_API_VERSION)
            .field("price_id", &self.price_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, ENV_STRIPE_SECRET_KEY};

    fn config(price_id: &str) -> ServerPaymentsConfig {
        ServerPaymentsConfig {
            secret_key: "sk_test_xyz".to_string(),
            price_id: price_id.to_string(),
        }
    }

    #[test]
    fn test_client_exposes_default_price() {
        let client = PaymentsClient::new(&config(DEFAULT_PRICE_ID)).unwrap();
        assert_eq!(client.default_price_id(), "price_default");

        let request = client.request(Method::GET, "v1/prices").build().unwrap();
        assert_eq!(request.url().as_str(), "https://api.stripe.com/v1/prices");
    }

    #[test]
    fn test_missing_secret_never_builds_client() {
        let result = ServerPaymentsConfig::from_lookup(|_| None)
            .map_err(PaymentsError::from)
            .and_then(|config| PaymentsClient::new(&config));

        match result {
            Err(PaymentsError::Config(ConfigError::Missing { var })) => {
                assert_eq!(var, ENV_STRIPE_SECRET_KEY)
            }
            other => panic!("expected missing secret error, got {other:?}"),
        }
    }

    #[test]
    fn test_secret_with_control_characters_rejected() {
        let mut bad = config(DEFAULT_PRICE_ID);
        bad.secret_key = "sk_test\nInjected: yes".to_string();
        let err = PaymentsClient::new(&bad).unwrap_err();
        assert!(matches!(err, PaymentsError::InvalidHeader(_)));
    }

    #[test]
    fn test_request_joins_base_url() {
        let client =
            PaymentsClient::with_base_url(&config("price_123"), "http://localhost:12111/").unwrap();
        let request = client
            .request(Method::POST, "/v1/checkout/sessions")
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://localhost:12111/v1/checkout/sessions"
        );
        assert_eq!(request.method(), &Method::POST);
    }

    #[test]
    fn test_debug_hides_secret() {
        let client = PaymentsClient::new(&config(DEFAULT_PRICE_ID)).unwrap();
        let printed = format!("{client:?}");
        assert!(!printed.contains("sk_test_xyz"));
        assert!(printed.contains("2023-10-16"));
    }
}
