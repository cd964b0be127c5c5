//! Application configuration.
//!
//! Configuration comes from three sources, merged in priority order
//! (highest to lowest):
//! 1. YAML file values
//! 2. Environment variables (actual ENV vars override .env values)
//! 3. Default values
//!
//! The .env file is loaded into the environment at startup in `main`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::core::live::LiveConfig;

/// Default frame length for microphone capture, in samples.
pub const DEFAULT_CAPTURE_FRAME_SAMPLES: usize = 512;

fn default_connect_timeout_ms() -> u64 {
    10_000
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("GEMINI_API_KEY is not set (env var, .env, or `api_key` in the config file)")]
    MissingApiKey,

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Raw YAML file shape; every field optional so partial files merge over
/// the environment base.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct YamlConfig {
    api_key: Option<String>,
    model: Option<String>,
    instruction_url: Option<String>,
    instruction_file: Option<PathBuf>,
    instruction_text: Option<String>,
    output_transcription: Option<bool>,
    input_transcription: Option<bool>,
    proactive_audio: Option<bool>,
    connect_timeout_ms: Option<u64>,
}

/// Resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Gemini API key; opaque, never parsed
    pub api_key: String,

    /// Model name; empty selects the built-in default
    pub model: String,

    /// URL to GET the system instruction from before starting
    pub instruction_url: Option<String>,

    /// Local file holding the system instruction
    pub instruction_file: Option<PathBuf>,

    /// Inline system instruction; highest precedence of the three sources
    pub instruction_text: Option<String>,

    /// Request transcription of model audio output
    pub output_transcription: bool,

    /// Request transcription of user audio input
    pub input_transcription: bool,

    /// Let the model decide when to speak proactively
    pub proactive_audio: bool,

    /// Socket connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: String::new(),
            instruction_url: None,
            instruction_file: None,
            instruction_text: None,
            output_transcription: true,
            input_transcription: true,
            proactive_audio: true,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Load from environment variables over defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a YAML file, with environment variables as the base.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let yaml: YamlConfig =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.apply_yaml(yaml);
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.api_key = key;
        }
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            self.model = model;
        }
        if let Ok(url) = std::env::var("SYSTEM_INSTRUCTION_URL") {
            self.instruction_url = Some(url);
        }
        if let Ok(file) = std::env::var("SYSTEM_INSTRUCTION_FILE") {
            self.instruction_file = Some(PathBuf::from(file));
        }
        if let Ok(text) = std::env::var("SYSTEM_INSTRUCTION") {
            self.instruction_text = Some(text);
        }
        if let Ok(raw) = std::env::var("CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms =
                raw.parse().map_err(|_| ConfigError::InvalidValue {
                    name: "CONNECT_TIMEOUT_MS".to_string(),
                    value: raw,
                })?;
        }
        Ok(())
    }

    fn apply_yaml(&mut self, yaml: YamlConfig) {
        if let Some(key) = yaml.api_key {
            self.api_key = key;
        }
        if let Some(model) = yaml.model {
            self.model = model;
        }
        if let Some(url) = yaml.instruction_url {
            self.instruction_url = Some(url);
        }
        if let Some(file) = yaml.instruction_file {
            self.instruction_file = Some(file);
        }
        if let Some(text) = yaml.instruction_text {
            self.instruction_text = Some(text);
        }
        if let Some(v) = yaml.output_transcription {
            self.output_transcription = v;
        }
        if let Some(v) = yaml.input_transcription {
            self.input_transcription = v;
        }
        if let Some(v) = yaml.proactive_audio {
            self.proactive_audio = v;
        }
        if let Some(v) = yaml.connect_timeout_ms {
            self.connect_timeout_ms = v;
        }
    }

    /// Validate that the configuration can start a session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }

    /// Build the transport configuration, with the resolved system
    /// instruction filled in.
    pub fn live_config(&self, system_instruction: String) -> LiveConfig {
        LiveConfig {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            system_instruction,
            endpoint: None,
            output_transcription: self.output_transcription,
            input_transcription: self.input_transcription,
            proactive_audio: self.proactive_audio,
            connect_timeout_ms: self.connect_timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.api_key.is_empty());
        assert!(config.output_transcription);
        assert!(config.input_transcription);
        assert!(config.proactive_audio);
        assert_eq!(config.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_validate_requires_api_key() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingApiKey)));

        let config = AppConfig {
            api_key: "k".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_overrides_base() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "api_key: from-yaml\nmodel: gemini-2.5-flash-native-audio-preview-12-2025\nproactive_audio: false\nconnect_timeout_ms: 2500"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api_key, "from-yaml");
        assert_eq!(config.model, "gemini-2.5-flash-native-audio-preview-12-2025");
        assert!(!config.proactive_audio);
        assert_eq!(config.connect_timeout_ms, 2500);
        // Untouched fields keep their defaults.
        assert!(config.output_transcription);
    }

    #[test]
    fn test_unknown_yaml_field_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_key: k\nnot_a_field: 1").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_live_config_carries_settings() {
        let config = AppConfig {
            api_key: "k".to_string(),
            model: "m".to_string(),
            input_transcription: false,
            ..Default::default()
        };
        let live = config.live_config("be brief".to_string());
        assert_eq!(live.api_key, "k");
        assert_eq!(live.model, "m");
        assert_eq!(live.system_instruction, "be brief");
        assert!(!live.input_transcription);
    }
}
