//! Layered application configuration.
//!
//! Priority: CLI flag > CLI env var > `COGNIFY_` env var > config file > defaults.

use crate::llm::{LlmSettings, Provider};
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Stream model output (true) or wait for the whole response (false)
    #[arg(long, env = "EXTRACTION_STREAMING")]
    pub streaming: Option<bool>,

    /// Hard node cap per graph
    #[arg(long, env = "HARD_NODE_CAP")]
    pub hard_node_cap: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Limits and behavior of the extraction pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Node count that triggers a one-time warning.
    pub soft_node_cap: usize,
    /// Node count that stops extraction.
    pub hard_node_cap: usize,
    /// Words kept from each predicate.
    pub max_predicate_words: usize,
    /// Longest accepted input, in characters.
    pub max_input_chars: usize,
    /// Confidence recorded on extracted edges.
    pub edge_confidence: f32,
    /// Parse model output incrementally as it streams.
    pub streaming: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            soft_node_cap: 300,
            hard_node_cap: 500,
            max_predicate_words: 3,
            max_input_chars: 50_000,
            edge_confidence: 0.9,
            streaming: true,
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.hard_node_cap == 0 {
            return Err(config::ConfigError::Message(
                "extraction.hard_node_cap must be greater than 0".to_string(),
            ));
        }
        if self.hard_node_cap < self.soft_node_cap {
            return Err(config::ConfigError::Message(format!(
                "extraction.hard_node_cap ({}) must be >= extraction.soft_node_cap ({})",
                self.hard_node_cap, self.soft_node_cap
            )));
        }
        if self.max_predicate_words == 0 {
            return Err(config::ConfigError::Message(
                "extraction.max_predicate_words must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let defaults = ExtractionConfig::default();
        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("extraction.soft_node_cap", defaults.soft_node_cap as u64)?
            .set_default("extraction.hard_node_cap", defaults.hard_node_cap as u64)?
            .set_default(
                "extraction.max_predicate_words",
                defaults.max_predicate_words as u64,
            )?
            .set_default("extraction.max_input_chars", defaults.max_input_chars as u64)?
            .set_default("extraction.edge_confidence", f64::from(defaults.edge_confidence))?
            .set_default("extraction.streaming", defaults.streaming)?;

        // Config file: explicit path must exist, ./config.yaml is optional.
        match &cli.config {
            Some(path) => builder = builder.add_source(File::with_name(path).required(true)),
            None if Path::new("config.yaml").exists() => {
                builder = builder.add_source(File::with_name("config.yaml").required(false));
            }
            None => {}
        }

        // E.g. COGNIFY_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("COGNIFY")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(streaming) = cli.streaming {
            builder = builder.set_override("extraction.streaming", streaming)?;
        }
        if let Some(cap) = cli.hard_node_cap {
            builder = builder.set_override("extraction.hard_node_cap", cap as u64)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.extraction.validate()?;
        Ok(cfg)
    }
}

pub fn load_llm_settings() -> Result<LlmSettings, String> {
    let base_url =
        env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com".to_string());
    if base_url.trim().is_empty() {
        return Err("LLM_BASE_URL cannot be empty".to_string());
    }

    let model = env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    if model.trim().is_empty() {
        return Err("LLM_MODEL cannot be empty".to_string());
    }

    let mut settings = LlmSettings::new(base_url, model);

    settings.api_key = env::var("LLM_API_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty());

    if let Some(secs) = parse_env::<u64>("LLM_TIMEOUT_SECS")? {
        settings.timeout = Duration::from_secs(secs);
    }
    if let Some(temperature) = parse_env::<f32>("LLM_TEMPERATURE")? {
        settings.temperature = temperature;
    }
    if let Some(max_tokens) = parse_env::<u32>("LLM_MAX_TOKENS")? {
        settings.max_tokens = max_tokens;
    }

    // Update provider with Azure deployment info if provided
    if let Provider::AzureOpenAI { .. } = &settings.provider
        && let Ok(deployment_name) = env::var("AZURE_DEPLOYMENT_NAME")
    {
        settings.provider = Provider::AzureOpenAI {
            deployment_name,
            api_version: env::var("AZURE_API_VERSION")
                .unwrap_or_else(|_| "2024-08-01-preview".to_string()),
        };
    }

    Ok(settings)
}

fn parse_env<T>(key: &str) -> Result<Option<T>, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("Invalid value for {key}: {raw} ({e})")),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_extraction_config_is_valid() {
        let cfg = ExtractionConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.soft_node_cap, 300);
        assert_eq!(cfg.hard_node_cap, 500);
    }

    #[test]
    fn test_rejects_inverted_caps() {
        let cfg = ExtractionConfig {
            soft_node_cap: 10,
            hard_node_cap: 5,
            ..ExtractionConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_predicate_words() {
        let cfg = ExtractionConfig {
            max_predicate_words: 0,
            ..ExtractionConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
