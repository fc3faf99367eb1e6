use std::env;

use log::*;
use psp_common::parse_boolean_flag;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/psp_orders.db";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACCOUNTING_CURRENCY: &str = "EUR";
const DEFAULT_NOTIFY_TOPIC: &str = "notify_payment";
const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;

/// Runtime configuration for the order-processing engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// The accounting currency of the PSP itself. Fees and order amounts are also booked in this currency.
    pub psp_accounting_currency: String,
    /// Message topic that finalized orders are published to.
    pub notify_topic: String,
    pub event_buffer_size: usize,
    /// If true, order requests without a signature are rejected.
    pub require_signature: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            psp_accounting_currency: DEFAULT_ACCOUNTING_CURRENCY.to_string(),
            notify_topic: DEFAULT_NOTIFY_TOPIC.to_string(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            require_signature: false,
        }
    }
}

impl EngineConfig {
    /// Loads a `.env` file if one is present, and then reads the configuration from the environment.
    pub fn load() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            debug!("🪛️ No .env file loaded. {e}");
        }
        Self::from_env_or_default()
    }

    pub fn from_env_or_default() -> Self {
        let database_url = env::var("PSP_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ PSP_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let db_max_connections = env::var("PSP_DB_MAX_CONNECTIONS")
            .map(|s| {
                s.parse::<u32>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid value for PSP_DB_MAX_CONNECTIONS. {e} Using the default, \
                         {DEFAULT_DB_MAX_CONNECTIONS}, instead."
                    );
                    DEFAULT_DB_MAX_CONNECTIONS
                })
            })
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
        let psp_accounting_currency = env::var("PSP_ACCOUNTING_CURRENCY")
            .ok()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| {
                let valid = s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic());
                if !valid {
                    error!("🪛️ {s} is not a valid currency code for PSP_ACCOUNTING_CURRENCY. Using the default.");
                }
                valid
            })
            .unwrap_or_else(|| DEFAULT_ACCOUNTING_CURRENCY.to_string());
        let notify_topic = env::var("PSP_NOTIFY_TOPIC")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NOTIFY_TOPIC.to_string());
        let event_buffer_size = env::var("PSP_EVENT_BUFFER_SIZE")
            .map(|s| {
                s.parse::<usize>().ok().filter(|n| *n > 0).unwrap_or_else(|| {
                    warn!(
                        "🪛️ {s} is not a valid buffer size for PSP_EVENT_BUFFER_SIZE. Using the default, \
                         {DEFAULT_EVENT_BUFFER_SIZE}, instead."
                    );
                    DEFAULT_EVENT_BUFFER_SIZE
                })
            })
            .unwrap_or(DEFAULT_EVENT_BUFFER_SIZE);
        let require_signature = parse_boolean_flag(env::var("PSP_REQUIRE_SIGNATURE").ok(), false);
        if !require_signature {
            warn!("🪛️ Unsigned order requests are accepted. Set PSP_REQUIRE_SIGNATURE=1 to reject them.");
        }
        Self {
            database_url,
            db_max_connections,
            psp_accounting_currency,
            notify_topic,
            event_buffer_size,
            require_signature,
        }
    }

    pub fn with_psp_accounting_currency(mut self, currency: &str) -> Self {
        self.psp_accounting_currency = currency.to_string();
        self
    }

    pub fn with_required_signature(mut self, required: bool) -> Self {
        self.require_signature = required;
        self
    }
}
