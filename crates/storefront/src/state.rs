//! Application state shared across handlers.

use std::sync::Arc;

use crate::checkout::CheckoutApiProvider;
use crate::config::StorefrontConfig;
use crate::saleor::SaleorClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// configuration and the checkout API.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    checkout_api: Arc<dyn CheckoutApiProvider>,
}

impl AppState {
    /// Create a new application state backed by the configured Saleor API.
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        let saleor = SaleorClient::new(&config.saleor);
        Self::with_provider(config, Arc::new(saleor))
    }

    /// Create application state with a custom checkout API provider.
    #[must_use]
    pub fn with_provider(
        config: StorefrontConfig,
        checkout_api: Arc<dyn CheckoutApiProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                checkout_api,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the provider of per-attempt checkout API sessions.
    #[must_use]
    pub fn checkout_api(&self) -> &dyn CheckoutApiProvider {
        self.inner.checkout_api.as_ref()
    }
}
