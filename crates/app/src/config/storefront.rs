//! Storefront Config

use clap::Args;

/// Storefront GraphQL API settings.
#[derive(Debug, Args)]
pub struct StorefrontConfig {
    /// Storefront GraphQL endpoint
    #[arg(id = "storefront_url", long = "storefront-url", env = "STOREFRONT_API_URL")]
    pub url: String,

    /// Storefront API access token
    #[arg(id = "storefront_token", long = "storefront-token", env = "STOREFRONT_ACCESS_TOKEN", hide_env_values = true)]
    pub token: String,

    /// ISO 4217 code used for totals until the storefront reports a currency
    #[arg(long, env = "STOREFRONT_CURRENCY", default_value = "USD")]
    pub currency: String,

    /// Request timeout in seconds
    #[arg(id = "storefront_timeout_secs", long = "storefront-timeout-secs", env = "STOREFRONT_TIMEOUT_SECS", default_value_t = 10_u64)]
    pub timeout_secs: u64,
}
