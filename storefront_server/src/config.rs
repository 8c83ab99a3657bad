//! Server configuration.
//!
//! Everything is read from environment variables (a `.env` file is loaded first, if present). Missing or malformed
//! values are logged and replaced with their defaults, so the server always starts.
use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use storefront_common::{
    helpers::{parse_boolean_flag, parse_numeric_setting},
    Secret,
    DEFAULT_CURRENCY_CODE,
};
use storefront_engine::{
    cart::PricingPolicy,
    lifecycle::DEFAULT_PAYMENT_SESSION_WINDOW,
    sync::{SyncConfig, DEFAULT_MAX_CONSECUTIVE_FAILURES, DEFAULT_POLL_INTERVAL, DEFAULT_REDIRECT_DELAY},
};

const DEFAULT_SF_HOST: &str = "127.0.0.1";
const DEFAULT_SF_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.db?mode=rwc";
const DEFAULT_EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_SESSION_RETENTION: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Secret<String>,
    /// Apply the embedded schema migrations on start-up.
    pub run_migrations: bool,
    pub sync: SyncConfig,
    /// How long a payment may stay open before its session timer expires it.
    pub payment_session_timeout: Duration,
    /// How often the expiry worker sweeps for stale payments whose timers were lost.
    pub expiry_sweep_interval: Duration,
    /// How long a finished checkout session stays queryable before it is evicted.
    pub session_retention: Duration,
    pub pricing: PricingPolicy,
    pub currency: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SF_HOST.to_string(),
            port: DEFAULT_SF_PORT,
            database_url: Secret::new(DEFAULT_DATABASE_URL.to_string()),
            run_migrations: true,
            sync: SyncConfig::default(),
            payment_session_timeout: DEFAULT_PAYMENT_SESSION_WINDOW,
            expiry_sweep_interval: DEFAULT_EXPIRY_SWEEP_INTERVAL,
            session_retention: DEFAULT_SESSION_RETENTION,
            pricing: PricingPolicy::default(),
            currency: DEFAULT_CURRENCY_CODE.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let host = env::var("SF_HOST").ok().unwrap_or_else(|| DEFAULT_SF_HOST.into());
        let port = setting("SF_PORT", DEFAULT_SF_PORT);
        let database_url = env::var("SF_DATABASE_URL").map(Secret::new).unwrap_or_else(|_| {
            warn!("🪛️ SF_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}");
            defaults.database_url.clone()
        });
        let run_migrations = parse_boolean_flag(env::var("SF_RUN_MIGRATIONS").ok(), defaults.run_migrations);
        let poll_interval = match setting("SF_POLL_INTERVAL", DEFAULT_POLL_INTERVAL.as_secs()) {
            0 => {
                warn!("🪛️ SF_POLL_INTERVAL cannot be zero. Using the default, {}s", DEFAULT_POLL_INTERVAL.as_secs());
                DEFAULT_POLL_INTERVAL
            },
            secs => Duration::from_secs(secs),
        };
        let default_redirect_ms = u64::try_from(DEFAULT_REDIRECT_DELAY.as_millis()).unwrap_or(u64::MAX);
        let sync = SyncConfig {
            poll_interval,
            redirect_delay: Duration::from_millis(setting("SF_REDIRECT_DELAY_MS", default_redirect_ms)),
            max_consecutive_failures: setting("SF_MAX_SYNC_FAILURES", DEFAULT_MAX_CONSECUTIVE_FAILURES),
        };
        let payment_session_timeout = Duration::from_secs(setting(
            "SF_PAYMENT_SESSION_TIMEOUT",
            DEFAULT_PAYMENT_SESSION_WINDOW.as_secs(),
        ));
        let expiry_sweep_interval = Duration::from_secs(
            setting("SF_EXPIRY_SWEEP_INTERVAL", DEFAULT_EXPIRY_SWEEP_INTERVAL.as_secs()).max(1),
        );
        let session_retention =
            Duration::from_secs(setting("SF_SESSION_RETENTION", DEFAULT_SESSION_RETENTION.as_secs()));
        let pricing = PricingPolicy {
            tax_rate_bps: setting("SF_TAX_RATE_BPS", defaults.pricing.tax_rate_bps),
            free_shipping_threshold: setting("SF_FREE_SHIPPING_THRESHOLD", defaults.pricing.free_shipping_threshold),
            flat_shipping_cost: setting("SF_FLAT_SHIPPING_COST", defaults.pricing.flat_shipping_cost),
        };
        let pricing = if pricing.flat_shipping_cost.is_negative() || pricing.free_shipping_threshold.is_negative() {
            error!("🪛️ Shipping amounts cannot be negative. Reverting to the default pricing policy.");
            defaults.pricing
        } else {
            pricing
        };
        let currency = env::var("SF_CURRENCY").map(|s| s.trim().to_uppercase()).unwrap_or(defaults.currency);
        info!(
            "🪛️ Pricing: {} bps tax, free shipping from {}, otherwise {} ({currency})",
            pricing.tax_rate_bps, pricing.free_shipping_threshold, pricing.flat_shipping_cost
        );
        Self {
            host,
            port,
            database_url,
            run_migrations,
            sync,
            payment_session_timeout,
            expiry_sweep_interval,
            session_retention,
            pricing,
            currency,
        }
    }
}

/// Reads and parses a single setting, logging and falling back to `default` if it is missing or malformed.
fn setting<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match parse_numeric_setting::<T>(env::var(name).ok()) {
        Ok(Some(v)) => v,
        Ok(None) => {
            debug!("🪛️ {name} is not set. Using the default, {default}");
            default
        },
        Err(e) => {
            error!("🪛️ Invalid configuration value for {name}. {e} Using the default, {default}, instead.");
            default
        },
    }
}

#[cfg(test)]
mod test {
    use storefront_common::Cents;

    use super::*;

    // Environment variables are process-wide, so everything that touches them lives in one test.
    #[test]
    fn from_env() {
        let config = ServerConfig::from_env_or_default();
        assert_eq!(config.port, DEFAULT_SF_PORT);
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.pricing, PricingPolicy::default());

        env::set_var("SF_PORT", "9000");
        env::set_var("SF_POLL_INTERVAL", "0");
        env::set_var("SF_REDIRECT_DELAY_MS", "250");
        env::set_var("SF_MAX_SYNC_FAILURES", "lots");
        env::set_var("SF_FREE_SHIPPING_THRESHOLD", "75.00");
        env::set_var("SF_TAX_RATE_BPS", "1000");
        env::set_var("SF_CURRENCY", "eur");
        env::set_var("SF_RUN_MIGRATIONS", "no");
        env::set_var("SF_SESSION_RETENTION", "5");
        let config = ServerConfig::from_env_or_default();
        assert_eq!(config.port, 9000);
        assert_eq!(config.sync.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.sync.redirect_delay, Duration::from_millis(250));
        assert_eq!(config.sync.max_consecutive_failures, DEFAULT_MAX_CONSECUTIVE_FAILURES);
        assert_eq!(config.pricing.free_shipping_threshold, Cents::from(7_500));
        assert_eq!(config.pricing.tax_rate_bps, 1_000);
        assert_eq!(config.currency, "EUR");
        assert!(!config.run_migrations);
        assert_eq!(config.session_retention, Duration::from_secs(5));
        for name in [
            "SF_PORT",
            "SF_POLL_INTERVAL",
            "SF_REDIRECT_DELAY_MS",
            "SF_MAX_SYNC_FAILURES",
            "SF_FREE_SHIPPING_THRESHOLD",
            "SF_TAX_RATE_BPS",
            "SF_CURRENCY",
            "SF_RUN_MIGRATIONS",
            "SF_SESSION_RETENTION",
        ] {
            env::remove_var(name);
        }
    }
}
