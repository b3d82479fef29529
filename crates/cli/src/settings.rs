//! Startup configuration: the JSON config file and environment secrets.

use std::path::Path;

use pipeline::{ConfigError, PipelineConfig};

/// Loads and validates the configuration file.
///
/// A missing file yields the defaults; an unreadable or invalid one is an error.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            let config = PipelineConfig::default();
            config.validate()?;
            return Ok(config);
        }
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        }
    };
    PipelineConfig::from_json(&text)
}

/// Credentials for the external services. Never read from the config file.
#[derive(Clone)]
pub struct Secrets {
    pub anthropic_api_key: String,
    pub supabase_url: String,
    pub supabase_key: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("supabase_url", &self.supabase_url)
            .finish_non_exhaustive()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| {
            get(name).ok_or_else(|| ConfigError::MissingSecret {
                name: name.to_string(),
            })
        };

        let anthropic_api_key = require("ANTHROPIC_API_KEY")?;
        let supabase_url = require("SUPABASE_URL")?;
        let supabase_key = match get("SUPABASE_ANON_KEY").or_else(|| get("SUPABASE_KEY")) {
            Some(key) => key,
            None => require("SUPABASE_ANON_KEY")?,
        };
        Ok(Self {
            anthropic_api_key,
            supabase_url,
            supabase_key,
        })
    }
}
