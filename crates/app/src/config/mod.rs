//! Application configuration
//!
//! Every setting can be given as a flag or through the environment; a `.env`
//! file in the working directory is loaded first when present.

use clap::Args;
use thiserror::Error;
use trolley::settings::SyncSettings;

mod associations;
mod logging;
mod storage;
mod storefront;
mod sync;

pub use associations::AssociationConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use storage::StorageConfig;
pub use storefront::StorefrontConfig;
pub use sync::SyncConfig;

/// Errors raised while turning configuration into runtime settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The currency code is not an ISO 4217 code.
    #[error("unknown currency code {0}")]
    UnknownCurrency(String),

    /// A duration is too large to represent.
    #[error("{0} is out of range")]
    OutOfRange(&'static str),
}

/// Everything needed to run a cart store against real collaborators.
#[derive(Debug, Args)]
pub struct AppConfig {
    /// Storefront API settings.
    #[command(flatten)]
    pub storefront: StorefrontConfig,

    /// Customer → cart association store settings.
    #[command(flatten)]
    pub associations: AssociationConfig,

    /// Client-local state settings.
    #[command(flatten)]
    pub storage: StorageConfig,

    /// Debounce, polling and timeout settings.
    #[command(flatten)]
    pub sync: SyncConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Runtime settings for the cart store.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the currency is unknown or a duration is out of range.
    pub fn sync_settings(&self) -> Result<SyncSettings, ConfigError> {
        let currency = rusty_money::iso::find(&self.storefront.currency)
            .ok_or_else(|| ConfigError::UnknownCurrency(self.storefront.currency.clone()))?;

        Ok(SyncSettings {
            currency,
            association_ttl: self.associations.ttl()?,
            ..self.sync.settings()?
        })
    }
}

/// Load a `.env` file from the working directory, if there is one.
pub fn load_dotenv() {
    _ = dotenvy::dotenv();
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use testresult::TestResult;

    use super::*;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        config: AppConfig,
    }

    fn parse(extra: &[&str]) -> Result<AppConfig, clap::Error> {
        let args = [
            "trolley",
            "--storefront-url",
            "https://shop.test/api/2025-01/graphql.json",
            "--storefront-token",
            "public-token",
            "--kv-url",
            "https://kv.test",
            "--kv-token",
            "kv-secret",
        ];

        Harness::try_parse_from(args.iter().chain(extra)).map(|harness| harness.config)
    }

    #[test]
    fn defaults_produce_standard_timings() -> TestResult {
        let settings = parse(&[])?.sync_settings()?;

        assert_eq!(settings, SyncSettings::default());

        Ok(())
    }

    #[test]
    fn overrides_reach_sync_settings() -> TestResult {
        let settings = parse(&[
            "--update-debounce-ms",
            "250",
            "--poll-interval-secs",
            "5",
            "--association-ttl-days",
            "7",
            "--currency",
            "EUR",
        ])?
        .sync_settings()?;

        assert_eq!(settings.update_debounce.as_millis(), 250);
        assert_eq!(settings.poll_interval.as_secs(), 5);
        assert_eq!(settings.association_ttl.as_hours(), 7 * 24);
        assert_eq!(settings.currency.iso_alpha_code, "EUR");

        Ok(())
    }

    #[test]
    fn unknown_currency_is_rejected() -> TestResult {
        let result = parse(&["--currency", "ZZZ"])?.sync_settings();

        assert!(
            matches!(result, Err(ConfigError::UnknownCurrency(ref code)) if code == "ZZZ"),
            "expected unknown currency, got {result:?}"
        );

        Ok(())
    }

    #[test]
    fn storefront_settings_are_required() {
        let result = Harness::try_parse_from(["trolley", "--kv-url", "https://kv.test"]);

        assert!(result.is_err(), "missing storefront url must fail");
    }
}
