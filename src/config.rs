//! Runtime configuration.
//!
//! Values come from the environment; CLI flags layered on top by `main`
//! take precedence.

use anyhow::Context;

use crate::summary::DEFAULT_DEADLINE_WINDOW_DAYS;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Postgres connection string. Missing is allowed until a query runs.
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Window used by the `upcoming` command.
    pub deadline_window_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            deadline_window_days: DEFAULT_DEADLINE_WINDOW_DAYS,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config {
            database_url: lookup("DATABASE_URL")
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            ..Config::default()
        };

        if let Some(raw) = lookup("GRANT_PIPELINE_MAX_CONNECTIONS") {
            config.max_connections = raw
                .trim()
                .parse()
                .with_context(|| format!("GRANT_PIPELINE_MAX_CONNECTIONS is not a number: {raw}"))?;
        }

        if let Some(raw) = lookup("GRANT_PIPELINE_DEADLINE_WINDOW_DAYS") {
            config.deadline_window_days = raw.trim().parse().with_context(|| {
                format!("GRANT_PIPELINE_DEADLINE_WINDOW_DAYS is not a number: {raw}")
            })?;
        }

        anyhow::ensure!(config.max_connections > 0, "max connections must be at least 1");
        Ok(config)
    }
}
