//! Runtime configuration for the inventory services.

use std::str::FromStr;

use chrono::Duration;
use tracing::warn;

pub const ENV_LOW_STOCK_COOLDOWN_SECS: &str = "EVW_LOW_STOCK_COOLDOWN_SECS";
pub const ENV_DEFAULT_REORDER_POINT: &str = "EVW_DEFAULT_REORDER_POINT";
pub const ENV_MAX_HISTORY_PAGE_SIZE: &str = "EVW_MAX_HISTORY_PAGE_SIZE";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DB_MAX_CONNECTIONS: &str = "EVW_DB_MAX_CONNECTIONS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryConfig {
    /// Minimum gap between two low-stock alerts for the same bucket.
    pub low_stock_cooldown: Duration,
    /// Reorder point given to buckets created on first use.
    pub default_reorder_point: i64,
    /// Upper bound for `limit` on history pages.
    pub max_history_page_size: u32,
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            low_stock_cooldown: Duration::hours(2),
            default_reorder_point: 5,
            max_history_page_size: 100,
            database_url: None,
            db_max_connections: 5,
        }
    }
}

impl InventoryConfig {
    /// Read the process environment. Unset variables keep their defaults;
    /// unparsable or out-of-range ones are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`InventoryConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let cooldown_secs: i64 = parse_var(
            &lookup,
            ENV_LOW_STOCK_COOLDOWN_SECS,
            defaults.low_stock_cooldown.num_seconds(),
        );
        let default_reorder_point: i64 =
            parse_var(&lookup, ENV_DEFAULT_REORDER_POINT, defaults.default_reorder_point);
        let max_history_page_size: u32 =
            parse_var(&lookup, ENV_MAX_HISTORY_PAGE_SIZE, defaults.max_history_page_size);
        let db_max_connections: u32 =
            parse_var(&lookup, ENV_DB_MAX_CONNECTIONS, defaults.db_max_connections);
        let low_stock_cooldown = Duration::try_seconds(cooldown_secs.max(0)).unwrap_or_else(|| {
            warn!(
                key = ENV_LOW_STOCK_COOLDOWN_SECS,
                value = cooldown_secs,
                "ignoring out-of-range config value"
            );
            defaults.low_stock_cooldown
        });

        Self {
            low_stock_cooldown,
            default_reorder_point: default_reorder_point.max(0),
            max_history_page_size: max_history_page_size.max(1),
            database_url: lookup(ENV_DATABASE_URL).filter(|url| !url.trim().is_empty()),
            db_max_connections: db_max_connections.max(1),
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + core::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, default = %default, "ignoring unparsable config value");
                default
            }
        },
    }
}
