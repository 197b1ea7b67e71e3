use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KotaeConfig {
    pub server: ServerConfig,
    pub corpus: CorpusConfig,
    pub embedding: EmbeddingConfig,
    pub matcher: MatcherConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CorpusConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum cosine similarity (strict) for a corpus entry to be accepted.
    pub threshold: f32,
    /// Reply returned when no corpus entry clears the threshold.
    pub fallback: String,
}

impl Default for KotaeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            corpus: CorpusConfig::default(),
            embedding: EmbeddingConfig::default(),
            matcher: MatcherConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            log_level: "info".into(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        let path = default_kotae_dir()
            .join("corpus.json")
            .to_string_lossy()
            .into_owned();
        Self { path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_kotae_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            fallback: crate::matcher::DEFAULT_FALLBACK.into(),
        }
    }
}

/// Returns `~/.kotae/`
pub fn default_kotae_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".kotae")
}

/// Returns the default config file path: `~/.kotae/config.toml`
pub fn default_config_path() -> PathBuf {
    default_kotae_dir().join("config.toml")
}

impl KotaeConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            KotaeConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (KOTAE_CORPUS, KOTAE_PORT, KOTAE_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("KOTAE_CORPUS") {
            self.corpus.path = val;
        }
        if let Ok(val) = std::env::var("KOTAE_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("KOTAE_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the corpus path, expanding `~` if needed.
    pub fn resolved_corpus_path(&self) -> PathBuf {
        expand_tilde(&self.corpus.path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = KotaeConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.matcher.threshold, 0.5);
        assert!(config.corpus.path.ends_with("corpus.json"));
        assert!(!config.matcher.fallback.is_empty());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
port = 8080
log_level = "debug"

[corpus]
path = "/tmp/faq.json"

[matcher]
threshold = 0.7
"#;
        let config: KotaeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.corpus.path, "/tmp/faq.json");
        assert_eq!(config.matcher.threshold, 0.7);
        // defaults still apply for unset fields
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.embedding.model, "all-MiniLM-L6-v2");
        assert_eq!(config.matcher.fallback, crate::matcher::DEFAULT_FALLBACK);
    }

    // Single test for all env-var handling: the variables are process-global,
    // so touching KOTAE_* from two parallel test threads would race.
    #[test]
    fn env_overrides_apply() {
        let mut config = KotaeConfig::default();
        std::env::set_var("KOTAE_CORPUS", "/tmp/override.json");
        std::env::set_var("KOTAE_PORT", "9999");
        std::env::set_var("KOTAE_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.corpus.path, "/tmp/override.json");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.log_level, "trace");

        // An unparseable port override is ignored, keeping the default.
        std::env::set_var("KOTAE_PORT", "not-a-port");
        let mut config = KotaeConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.corpus.path, "/tmp/override.json");

        // Clean up
        std::env::remove_var("KOTAE_CORPUS");
        std::env::remove_var("KOTAE_PORT");
        std::env::remove_var("KOTAE_LOG_LEVEL");
    }
}
