//! Association Store Config

use clap::Args;
use jiff::SignedDuration;

use super::ConfigError;

/// REST key-value store holding customer → cart associations.
#[derive(Debug, Args)]
pub struct AssociationConfig {
    /// Key-value REST endpoint
    #[arg(id = "kv_url", long = "kv-url", env = "KV_REST_API_URL")]
    pub url: String,

    /// Key-value REST bearer token
    #[arg(id = "kv_token", long = "kv-token", env = "KV_REST_API_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Request timeout in seconds
    #[arg(id = "kv_timeout_secs", long = "kv-timeout-secs", env = "KV_TIMEOUT_SECS", default_value_t = 10_u64)]
    pub timeout_secs: u64,

    /// Days an association lives after its last write
    #[arg(long = "association-ttl-days", env = "ASSOCIATION_TTL_DAYS", default_value_t = 30_i64)]
    pub ttl_days: i64,
}

impl AssociationConfig {
    pub(super) fn ttl(&self) -> Result<SignedDuration, ConfigError> {
        self.ttl_days
            .checked_mul(24)
            .map(SignedDuration::from_hours)
            .ok_or(ConfigError::OutOfRange("association-ttl-days"))
    }
}
