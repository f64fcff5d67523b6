use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime settings persisted in `config.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Default destination UDP port for DDP fixtures.
    pub ddp_port: u16,
    /// How often fixture liveness is re-evaluated.
    pub health_check_interval_ms: u64,
    /// Consecutive send failures before a fixture is marked unhealthy.
    pub failure_threshold: u32,
    /// Frame rate used when a session or rule does not specify one.
    pub default_fps: u32,
    /// Fallback location for sunrise/sunset rules.
    pub default_latitude: f64,
    pub default_longitude: f64,
    /// IANA zone name for schedule evaluation.
    pub default_timezone: String,
    /// Directory holding the persisted entity documents.
    pub data_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            ddp_port: 4048,
            health_check_interval_ms: 30_000,
            failure_threshold: 60,
            default_fps: 30,
            default_latitude: 0.0,
            default_longitude: 0.0,
            default_timezone: "UTC".to_string(),
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Persisted configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub modified_at: String,
}

/// Loads, validates and saves the controller configuration.
/// Configuration is stored in `config.json` in the working directory by
/// default.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path: config_path.unwrap_or_else(|| PathBuf::from("config.json")),
            settings: Settings::default(),
        }
    }

    /// Load settings from the config file, creating it with defaults if
    /// it does not exist.
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::Read(e.to_string()))?;
        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Self::validate_settings(&config_file.settings).map_err(ConfigError::Validation)?;
        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
            }
        }

        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            modified_at: chrono::Utc::now().to_rfc3339(),
        };
        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(&self.config_path, content).map_err(|e| ConfigError::Write(e.to_string()))?;
        Ok(())
    }

    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::Validation)?;
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(1..=120).contains(&settings.default_fps) {
            errors.push("default_fps must be between 1 and 120".to_string());
        }
        if settings.failure_threshold == 0 {
            errors.push("failure_threshold must be at least 1".to_string());
        }
        if settings.health_check_interval_ms < 1000 {
            errors.push("health_check_interval_ms must be at least 1000".to_string());
        }
        if !(-90.0..=90.0).contains(&settings.default_latitude) {
            errors.push("default_latitude must be between -90 and 90".to_string());
        }
        if !(-180.0..=180.0).contains(&settings.default_longitude) {
            errors.push("default_longitude must be between -180 and 180".to_string());
        }
        if settings.default_timezone.parse::<chrono_tz::Tz>().is_err() {
            errors.push(format!(
                "default_timezone '{}' is not an IANA zone",
                settings.default_timezone
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(String),
    #[error("failed to write config file: {0}")]
    Write(String),
    #[error("failed to parse config file: {0}")]
    Parse(String),
    #[error("failed to serialize config: {0}")]
    Serialize(String),
    #[error("config validation errors: {}", .0.join(", "))]
    Validation(Vec<String>),
}
