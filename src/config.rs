//! Runtime configuration for the llama.cpp endpoint.
//!
//! Environment-derived defaults are read exactly once at startup via
//! [`LlamaConfig::from_env`] and passed down explicitly; nothing below this
//! layer reads process-wide state.

use std::env;
use std::str::FromStr;

/// Application-level constants
pub const APP_NAME: &str = "Recibo";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    "recibo=info".to_string()
}

/// Connection and sampling parameters for the llama.cpp server.
#[derive(Debug, Clone)]
pub struct LlamaConfig {
    /// OpenAI-compatible base URL, e.g. `http://localhost:8080/v1`.
    pub base_url: String,
    /// Model identifier; `None` resolves to the first model the server lists.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Blocking request timeout. Vision extraction on CPU can be slow, so
    /// the default is generous.
    pub timeout_secs: u64,
}

impl Default for LlamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/v1".to_string(),
            model: None,
            temperature: 0.0,
            max_tokens: 2048,
            timeout_secs: 300,
        }
    }
}

impl LlamaConfig {
    /// Build the configuration from `LLAMA_*` environment variables,
    /// falling back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("LLAMA_BASE_URL").unwrap_or(defaults.base_url),
            model: env::var("LLAMA_MODEL").ok().filter(|m| !m.is_empty()),
            temperature: env_or("LLAMA_TEMPERATURE", defaults.temperature),
            max_tokens: env_or("LLAMA_MAX_TOKENS", defaults.max_tokens),
            timeout_secs: env_or("LLAMA_TIMEOUT_SECS", defaults.timeout_secs),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
