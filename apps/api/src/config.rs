use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::editor::EngineConfig;

/// Where documents are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    Postgres { database_url: String },
    /// Process-local, lost on restart. For demos and local UI work.
    Memory,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: Storage,
    pub port: u16,
    pub rust_log: String,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage = match std::env::var("STORAGE").as_deref() {
            Ok("memory") => Storage::Memory,
            Ok("postgres") | Err(_) => Storage::Postgres {
                database_url: require_env("DATABASE_URL")?,
            },
            Ok(other) => bail!("STORAGE must be 'postgres' or 'memory', got '{other}'"),
        };

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            autosave_debounce: optional_env("AUTOSAVE_DEBOUNCE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.autosave_debounce),
            history_limit: optional_env("HISTORY_LIMIT")?
                .map(|n| n as usize)
                .unwrap_or(defaults.history_limit),
            coalesce_window: optional_env("HISTORY_COALESCE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.coalesce_window),
        };
        if engine.history_limit == 0 {
            bail!("HISTORY_LIMIT must be at least 1");
        }

        Ok(Config {
            storage,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            engine,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{key} must be a non-negative integer")),
        Err(_) => Ok(None),
    }
}
