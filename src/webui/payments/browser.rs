use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::BrowserPaymentsConfig;

use super::PaymentsError;

/// Client-side SDK script served by the payments provider.
pub const STRIPE_JS_URL: &str = "https://js.stripe.com/v3";

/// What the browser needs to construct its SDK instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentHandle {
    pub publishable_key: String,
    pub script_url: String,
}

/// Builds a [`PaymentHandle`]. Invoked at most once per [`BrowserPayments`].
pub trait HandleLoader: Send + Sync {
    fn load(
        &self,
        config: &BrowserPaymentsConfig,
    ) -> impl Future<Output = Result<PaymentHandle, PaymentsError>> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StripeJsLoader;

impl HandleLoader for StripeJsLoader {
    async fn load(&self, config: &BrowserPaymentsConfig) -> Result<PaymentHandle, PaymentsError> {
        // Anything in this handle ends up in the browser.
        if config.publishable_key.starts_with("sk_") || config.publishable_key.starts_with("rk_")
        {
            return Err(PaymentsError::Load(
                "publishable key slot holds a secret or restricted key".to_string(),
            ));
        }

        Ok(PaymentHandle {
            publishable_key: config.publishable_key.clone(),
            script_url: STRIPE_JS_URL.to_string(),
        })
    }
}

/// Process-wide memoized SDK handle.
///
/// The first caller runs the loader; callers arriving while it is in flight
/// wait on the same initialisation and all receive the same `Arc`. A failed
/// load leaves the cell empty so a later call can try again, but a loaded
/// handle is never replaced.
pub struct BrowserPayments<L = StripeJsLoader> {
    config: BrowserPaymentsConfig,
    loader: L,
    handle: OnceCell<Arc<PaymentHandle>>,
}

impl BrowserPayments<StripeJsLoader> {
    pub fn new(config: BrowserPaymentsConfig) -> Self {
        Self::with_loader(config, StripeJsLoader)
    }
}

impl<L: HandleLoader> BrowserPayments<L> {
    pub fn with_loader(config: BrowserPaymentsConfig, loader: L) -> Self {
        Self {
            config,
            loader,
            handle: OnceCell::new(),
        }
    }

    pub async fn handle(&self) -> Result<Arc<PaymentHandle>, PaymentsError> {
        self.handle
            .get_or_try_init(|| async {
                let handle = self.loader.load(&self.config).await?;
                info!(script_url = %handle.script_url, "Payments SDK handle loaded");
                Ok::<_, PaymentsError>(Arc::new(handle))
            })
            .await
            .map(Arc::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.initialized()
    }
}
