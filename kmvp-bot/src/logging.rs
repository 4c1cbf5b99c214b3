use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Maps a user-supplied level name to a filter and the name to report back.
/// Unknown names fall back to INFO.
#[must_use]
pub fn parse_level(name: &str) -> (LevelFilter, &'static str) {
    match name.trim().to_ascii_uppercase().as_str() {
        "TRACE" => (LevelFilter::TRACE, "TRACE"),
        "DEBUG" => (LevelFilter::DEBUG, "DEBUG"),
        "WARN" | "WARNING" => (LevelFilter::WARN, "WARNING"),
        "ERROR" | "CRITICAL" => (LevelFilter::ERROR, "ERROR"),
        _ => (LevelFilter::INFO, "INFO"),
    }
}

/// Handle on the process-wide log filter.
pub struct LogControl {
    handle: Option<reload::Handle<EnvFilter, Registry>>,
    level: RwLock<String>,
}

impl LogControl {
    /// Installs the global subscriber. `RUST_LOG` wins over `level` at startup.
    pub fn init(level: &str) -> Result<Self> {
        let (filter, name) = parse_level(level);
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter.to_string()));

        let (filter_layer, handle) = reload::Layer::new(env_filter);
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer())
            .try_init()?;

        Ok(Self {
            handle: Some(handle),
            level: RwLock::new(name.to_owned()),
        })
    }

    /// Tracks the level without a subscriber attached.
    #[cfg(test)]
    pub fn detached(level: &str) -> Self {
        Self {
            handle: None,
            level: RwLock::new(parse_level(level).1.to_owned()),
        }
    }

    #[must_use]
    pub fn level(&self) -> String {
        self.level
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swaps the active filter. Returns the level actually applied.
    pub fn set_level(&self, requested: &str) -> Result<&'static str> {
        let (filter, name) = parse_level(requested);
        if let Some(handle) = &self.handle {
            handle.reload(EnvFilter::new(filter.to_string()))?;
        }
        *self.level.write().unwrap_or_else(PoisonError::into_inner) = name.to_owned();
        tracing::info!("Log level set to {}", name);
        Ok(name)
    }
}
