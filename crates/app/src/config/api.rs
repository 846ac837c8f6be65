//! API Config

use std::time::Duration;

use clap::Args;

use crate::client::HttpCartClientConfig;

/// Storefront cart API settings.
#[derive(Debug, Args)]
pub struct ApiConfig {
    /// Base URL of the storefront API
    #[arg(long, env = "CART_API_URL", default_value = "http://localhost:8000/api")]
    pub api_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "CART_API_TIMEOUT_SECONDS", default_value_t = 10u64)]
    pub api_timeout_seconds: u64,

    /// Bearer token of the signed-in shopper; the cart stays local without one
    #[arg(long, env = "CART_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Identifier of the signed-in shopper, used in logs
    #[arg(long, env = "CART_USER_ID", default_value = "shopper")]
    pub user_id: String,
}

impl ApiConfig {
    /// Connection settings for [`crate::client::HttpCartClient`].
    #[must_use]
    pub fn client_config(&self) -> HttpCartClientConfig {
        HttpCartClientConfig {
            base_url: self.api_url.clone(),
            timeout: Duration::from_secs(self.api_timeout_seconds),
        }
    }
}
