// Configuration helpers - shared between the library and CLI
//
// Settings live in a JSON file under the config directory. A missing
// file means defaults; absent keys fall back to their serde defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cluster::DEFAULT_CLUSTER_THRESHOLD;
use crate::dedup::DEFAULT_DEDUP_THRESHOLD;
use crate::models::PipelineMode;
use crate::text::DEFAULT_MAX_KEYWORDS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64, // Similarity at which items are duplicates (0.0-1.0)
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: f64, // Similarity needed to join a cluster (0.0-1.0)
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default)]
    pub pipeline_mode: PipelineMode,
    #[serde(default)]
    pub storage_path: Option<String>, // None = config directory
    #[serde(default)]
    pub retention_days: Option<i32>, // None = never delete
}

fn default_dedup_threshold() -> f64 {
    DEFAULT_DEDUP_THRESHOLD
}

fn default_cluster_threshold() -> f64 {
    DEFAULT_CLUSTER_THRESHOLD
}

fn default_max_keywords() -> usize {
    DEFAULT_MAX_KEYWORDS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dedup_threshold: default_dedup_threshold(),
            cluster_threshold: default_cluster_threshold(),
            max_keywords: default_max_keywords(),
            pipeline_mode: PipelineMode::default(),
            storage_path: None,
            retention_days: None,
        }
    }
}

impl Settings {
    /// Directory holding the run history database.
    pub fn storage_dir(&self) -> PathBuf {
        match &self.storage_path {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => get_config_dir(),
        }
    }

    /// Update one setting by key, validating the value.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "dedup_threshold" | "dedup" => {
                self.dedup_threshold = parse_threshold(value, "dedup_threshold")?;
            }
            "cluster_threshold" | "cluster" => {
                self.cluster_threshold = parse_threshold(value, "cluster_threshold")?;
            }
            "max_keywords" | "keywords" => {
                self.max_keywords = value
                    .parse()
                    .map_err(|_| "Invalid number for max_keywords".to_string())?;
            }
            "pipeline_mode" | "mode" => {
                self.pipeline_mode = value.parse()?;
            }
            "storage_path" | "storage" => {
                self.storage_path = match value {
                    "" | "default" => None,
                    path => Some(path.to_string()),
                };
            }
            "retention_days" | "retention" => {
                self.retention_days = match value {
                    "never" | "none" => None,
                    days => {
                        let days: i32 = days
                            .parse()
                            .map_err(|_| "Invalid number for retention_days".to_string())?;
                        if days < 1 {
                            return Err("retention_days must be at least 1".to_string());
                        }
                        Some(days)
                    }
                };
            }
            _ => return Err(format!("Unknown config key: {}", key)),
        }
        Ok(())
    }
}

fn parse_threshold(value: &str, name: &str) -> Result<f64, String> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| format!("Invalid number for {}", name))?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(format!("{} must be between 0 and 1", name));
    }
    Ok(parsed)
}

pub fn get_config_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".kivo")
}

pub fn ensure_config_dir() -> Result<PathBuf, String> {
    let config_dir = get_config_dir();
    std::fs::create_dir_all(&config_dir)
        .map_err(|e| format!("Failed to create config directory: {}", e))?;
    Ok(config_dir)
}

pub fn get_settings_path() -> PathBuf {
    get_config_dir().join("settings.json")
}

// ============================================================================
// Settings file
// ============================================================================

pub fn read_settings() -> Result<Settings, String> {
    read_settings_from(&get_settings_path())
}

pub fn read_settings_from(path: &std::path::Path) -> Result<Settings, String> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read settings: {}", e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse settings: {}", e))
}

pub fn write_settings(settings: &Settings) -> Result<(), String> {
    ensure_config_dir()?;
    write_settings_to(&get_settings_path(), settings)
}

pub fn write_settings_to(path: &std::path::Path, settings: &Settings) -> Result<(), String> {
    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;
    std::fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))
}
