//! Sync Config

use std::time::Duration;

use clap::Args;
use jiff::SignedDuration;
use trolley::settings::SyncSettings;

use super::ConfigError;

/// Debounce windows, polling and timeouts.
#[derive(Debug, Args)]
pub struct SyncConfig {
    /// Quiet period before a quantity change is sent
    #[arg(long, env = "UPDATE_DEBOUNCE_MS", default_value_t = 800_u64)]
    pub update_debounce_ms: u64,

    /// Delay before a removal is sent
    #[arg(long, env = "REMOVE_DEBOUNCE_MS", default_value_t = 600_u64)]
    pub remove_debounce_ms: u64,

    /// Seconds between background refreshes
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 30_u64)]
    pub poll_interval_secs: u64,

    /// Longest wait for a running synchronization
    #[arg(long, env = "SYNC_TIMEOUT_MS", default_value_t = 2_000_u64)]
    pub sync_timeout_ms: u64,
}

impl SyncConfig {
    pub(super) fn settings(&self) -> Result<SyncSettings, ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::OutOfRange("poll-interval-secs"));
        }

        Ok(SyncSettings {
            update_debounce: millis(self.update_debounce_ms, "update-debounce-ms")?,
            remove_debounce: millis(self.remove_debounce_ms, "remove-debounce-ms")?,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            sync_timeout: Duration::from_millis(self.sync_timeout_ms),
            ..SyncSettings::default()
        })
    }
}

fn millis(value: u64, name: &'static str) -> Result<SignedDuration, ConfigError> {
    i64::try_from(value)
        .map(SignedDuration::from_millis)
        .map_err(|_overflow| ConfigError::OutOfRange(name))
}
