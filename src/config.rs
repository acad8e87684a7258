use crate::core::{Result, TabqlError};
use crate::guard::DEFAULT_AFFIRMATIVE;
use crate::infer::{self, TypeInferencer};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Database name used when neither the config nor the command line names one.
pub const DEFAULT_DATABASE: &str = "tabql";

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub connection: Option<ConnectionConfig>,
    pub guard: Option<GuardConfig>,
    pub inference: Option<InferenceConfig>,
    pub output: Option<OutputConfig>,
}

/// Where databases live and how connections behave.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectionConfig {
    pub data_dir: Option<PathBuf>,
    pub database: Option<String>,
    pub busy_timeout_ms: Option<u64>,
}

/// Destructive-operation confirmation.
#[derive(Debug, Default, Deserialize)]
pub struct GuardConfig {
    pub affirmative: Option<String>,
}

/// Type inference overrides.
#[derive(Debug, Default, Deserialize)]
pub struct InferenceConfig {
    pub name_length: Option<u32>,
    pub email_length: Option<u32>,
    /// Foreign-reference token to referenced table; replaces the defaults
    pub references: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Shell output settings.
#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    /// Print every statement before it runs
    pub preview: Option<bool>,
    pub format: Option<OutputFormat>,
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| TabqlError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let token = self.affirmative();
        if token.chars().count() != 1 || token.trim() != token {
            return Err(TabqlError::Config(format!(
                "guard.affirmative must be a single character, got '{}'",
                token
            )));
        }
        if let Some(inference) = &self.inference {
            if inference.name_length == Some(0) || inference.email_length == Some(0) {
                return Err(TabqlError::Config(
                    "inference lengths must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Affirmative confirmation token
    pub fn affirmative(&self) -> String {
        self.guard
            .as_ref()
            .and_then(|g| g.affirmative.clone())
            .unwrap_or_else(|| DEFAULT_AFFIRMATIVE.to_string())
    }

    /// Inference policy with configured overrides applied
    pub fn inferencer(&self) -> TypeInferencer {
        let mut inferencer = TypeInferencer::default();
        if let Some(inference) = &self.inference {
            inferencer.name_length = inference.name_length.unwrap_or(infer::DEFAULT_NAME_LENGTH);
            inferencer.email_length = inference.email_length.unwrap_or(infer::DEFAULT_EMAIL_LENGTH);
            if let Some(references) = &inference.references {
                inferencer.references = references
                    .iter()
                    .map(|(token, table)| (token.to_lowercase(), table.clone()))
                    .collect();
            }
        }
        inferencer
    }

    /// Directory holding database files
    pub fn data_dir(&self) -> PathBuf {
        self.connection
            .as_ref()
            .and_then(|c| c.data_dir.clone())
            .or_else(|| dirs::data_dir().map(|dir| dir.join("tabql")))
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    /// Database name to open
    pub fn database(&self) -> String {
        self.connection
            .as_ref()
            .and_then(|c| c.database.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string())
    }

    pub fn busy_timeout(&self) -> Option<Duration> {
        self.connection
            .as_ref()
            .and_then(|c| c.busy_timeout_ms)
            .map(Duration::from_millis)
    }

    pub fn preview(&self) -> bool {
        self.output.as_ref().and_then(|o| o.preview).unwrap_or(false)
    }

    pub fn format(&self) -> OutputFormat {
        self.output.as_ref().and_then(|o| o.format).unwrap_or_default()
    }
}

/// Default configuration file: `<config dir>/tabql/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tabql").join("config.toml"))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Config::from_toml(&content)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Config> {
    if path.as_ref().exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}
