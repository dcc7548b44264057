//! Configuration management for the arena server.
//!
//! Loads configuration from environment variables with sensible defaults.

use duel_arena_runtime::ArenaConfig;
use duel_arena_runtime::config::DEFAULT_ROUND_TIMER_SECS;
use std::env;
use std::str::FromStr;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,duel_arena=debug,sqlx=warn";

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind the HTTP server to
    pub host: String,
    /// HTTP port
    pub port: u16,
    /// Log filter (`RUST_LOG` syntax)
    pub log_level: String,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// `PostgreSQL` connection URL; `None` runs on the in-memory store
    pub database_url: Option<String>,
    /// Maximum number of pooled database connections
    pub database_max_connections: u32,
    /// Advisory round length in seconds
    pub round_timer_secs: u32,
    /// Resolve rounds automatically when their timer elapses
    pub auto_resolve: bool,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Unset or unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(&lookup, "PORT").unwrap_or(8080),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            metrics_host: lookup("METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            metrics_port: parsed(&lookup, "METRICS_PORT").unwrap_or(9090),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS").unwrap_or(10),
            round_timer_secs: parsed(&lookup, "ARENA_ROUND_TIMER_SECS").unwrap_or(DEFAULT_ROUND_TIMER_SECS),
            auto_resolve: parsed(&lookup, "ARENA_AUTO_RESOLVE").unwrap_or(true),
        }
    }

    /// Address of the HTTP server.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Address of the metrics server.
    #[must_use]
    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.metrics_host, self.metrics_port)
    }

    /// Arena tunables derived from this configuration.
    #[must_use]
    pub const fn arena(&self) -> ArenaConfig {
        ArenaConfig::new()
            .with_round_timer_secs(self.round_timer_secs)
            .with_auto_resolve(self.auto_resolve)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|raw| raw.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]);
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.metrics_addr(), "0.0.0.0:9090");
        assert_eq!(config.database_url, None);
        assert_eq!(config.log_level, DEFAULT_LOG_FILTER);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.round_timer_secs, 20);
        assert!(config.auto_resolve);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("PORT", "3000"),
            ("DATABASE_URL", "postgres://localhost/arena"),
            ("ARENA_ROUND_TIMER_SECS", "45"),
            ("ARENA_AUTO_RESOLVE", "false"),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/arena"));

        let arena = config.arena();
        assert_eq!(arena.round_timer_secs, 45);
        assert!(!arena.auto_resolve);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = config(&[("PORT", "eighty"), ("ARENA_AUTO_RESOLVE", "maybe"), ("DATABASE_URL", " ")]);
        assert_eq!(config.port, 8080);
        assert!(config.auto_resolve);
        assert_eq!(config.database_url, None);
    }
}
