//! Persistent configuration for oraculo.
//!
//! Stored in `~/.oraculo/config.json`. Every field has a default, so a
//! missing or unreadable file simply yields [`OraculoConfig::default`].
//!
//! # Example
//!
//! ```no_run
//! use oraculo_core::config::OraculoConfig;
//!
//! let config = OraculoConfig::load();
//! if let Some(generator) = &config.generator {
//!     println!("ai.craftHtml runs {}", generator.program);
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ipc::oraculo_dir;

const CONFIG_FILENAME: &str = "config.json";
const DEFAULT_GENERATOR_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

/// External program backing `ai.craftHtml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_generator_timeout_ms")]
    pub timeout_ms: u64,
}

impl GeneratorConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_ms: DEFAULT_GENERATOR_TIMEOUT_MS,
        }
    }
}

fn default_generator_timeout_ms() -> u64 {
    DEFAULT_GENERATOR_TIMEOUT_MS
}

fn default_session_idle_secs() -> u64 {
    DEFAULT_SESSION_IDLE_SECS
}

/// Persistent oraculo configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OraculoConfig {
    /// Content generator; `None` disables `ai.craftHtml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<GeneratorConfig>,

    /// Sessions idle for longer than this are evicted by the server.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl Default for OraculoConfig {
    fn default() -> Self {
        Self {
            generator: None,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
        }
    }
}

impl OraculoConfig {
    pub fn path() -> PathBuf {
        oraculo_dir().join(CONFIG_FILENAME)
    }

    /// Load config from `~/.oraculo/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        std::fs::read_to_string(Self::path())
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.oraculo/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(Self::path(), json)
    }
}
