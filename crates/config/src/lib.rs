use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Environment variables checked, in order, for the model API key.
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    /// Base URL of the generative-language REST API, without a trailing
    /// `/models` segment.
    pub base_url: String,
    /// API key.  Overridden at load time by `GEMINI_API_KEY` or `API_KEY`.
    pub api_key: String,
    /// Upper bound on a single grounded generation call.  `0` disables the
    /// client-side timeout.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: String::new(),
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Upper bound on offers requested from the model.
    pub max_offers: usize,
    /// Market the stores must operate in (named verbatim in the prompt).
    pub market: String,
    /// Domain suffix the prompt asks the model to prefer.  Empty disables
    /// the hint.
    pub preferred_domain: String,
    /// Sources every search is restricted to unless the user picks a scope.
    /// Empty means unrestricted web search.
    pub default_sources: Vec<String>,
    pub elapsed_tick_ms: u64,
    pub progress_tick_ms: u64,
    /// Inclusive lower bound of the simulated "items checked" increment.
    pub progress_step_min: u64,
    /// Exclusive upper bound of the simulated "items checked" increment.
    pub progress_step_max: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_offers: 8,
            market: "Brasil".to_string(),
            preferred_domain: ".com.br".to_string(),
            default_sources: vec![],
            elapsed_tick_ms: 1000,
            progress_tick_ms: 300,
            progress_step_min: 100,
            progress_step_max: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON document per storage key.
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: ".hyperscan/storage".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub storage: StorageConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        // Env key takes precedence over the config file.
        if let Some(key) = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| env::var(name).ok())
            .find(|value| !value.trim().is_empty())
        {
            config.llm.api_key = key;
        }

        if let Ok(dir) = env::var("HYPERSCAN_STORAGE_DIR") {
            if !dir.trim().is_empty() {
                config.storage.dir = dir;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        !self.llm.api_key.trim().is_empty()
    }

    /// Steps outside `min..max` would make the random range empty, so an
    /// inverted or collapsed range degrades to a fixed `min` step.
    pub fn progress_step_range(&self) -> (u64, u64) {
        let min = self.search.progress_step_min;
        let max = self.search.progress_step_max.max(min.saturating_add(1));
        (min, max)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
