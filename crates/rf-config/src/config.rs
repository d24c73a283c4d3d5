//! Configuration loaded from the review-fs.toml file.

use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};

const CONFIG_FILE: &str = "review-fs.toml";

/// Configuration loaded from review-fs.toml
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReviewConfig {
    /// Remote protocol dialect: "structured" or "counted"
    #[serde(default = "default_dialect")]
    pub dialect: String,

    /// Username used for self-author detection in note tags
    #[serde(default)]
    pub username: String,

    /// Default target branch for new merge proposals
    #[serde(default = "default_target_branch")]
    pub target_branch: String,

    /// Git remote the mirror tracks
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Context window size above an anchored thread
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,

    /// Mirror directory, relative to the repository root
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_dialect() -> String {
    "structured".to_string()
}

fn default_target_branch() -> String {
    "master".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_context_lines() -> usize {
    5
}

fn default_data_dir() -> String {
    "rf".to_string()
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            username: String::new(),
            target_branch: default_target_branch(),
            remote: default_remote(),
            context_lines: default_context_lines(),
            data_dir: default_data_dir(),
        }
    }
}

impl ReviewConfig {
    /// Load config from CWD first, then home directory, or use defaults.
    ///
    /// `REVIEW_FS_USER` and `REVIEW_FS_TARGET` override the configured
    /// username and target branch either way.
    pub fn load() -> Self {
        let mut config = if let Some(content) = load_config_file() {
            match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded review config from file");
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config file: {}", e);
                    Self::default()
                }
            }
        } else {
            log::debug!("Using default review config");
            Self::default()
        };
        if let Ok(user) = env::var("REVIEW_FS_USER") {
            config.username = user;
        }
        if let Ok(branch) = env::var("REVIEW_FS_TARGET") {
            config.target_branch = branch;
        }
        config
    }
}

/// Load config file content from CWD first, then home directory
///
/// Searches for review-fs.toml in:
/// 1. Current working directory
/// 2. Home directory as .review-fs.toml
///
/// Returns the file content if found, None otherwise.
pub fn load_config_file() -> Option<String> {
    if let Ok(content) = std::fs::read_to_string(CONFIG_FILE) {
        log::debug!("Loaded config from {}", CONFIG_FILE);
        return Some(content);
    }

    if let Some(home_config) = get_home_config_path() {
        if let Ok(content) = std::fs::read_to_string(&home_config) {
            log::debug!("Loaded config from {}", home_config.display());
            return Some(content);
        }
    }

    None
}

fn get_home_config_path() -> Option<PathBuf> {
    env::var_os("HOME").map(|home| PathBuf::from(home).join(format!(".{CONFIG_FILE}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config() {
        let config = ReviewConfig::default();
        assert_eq!(config.dialect, "structured");
        assert_eq!(config.target_branch, "master");
        assert_eq!(config.remote, "origin");
        assert_eq!(config.context_lines, 5);
        assert_eq!(config.data_dir, "rf");
        assert!(config.username.is_empty());
    }

    #[test]
    fn config_deserialize_partial() {
        let toml = r#"
            dialect = "counted"
            username = "me"
        "#;
        let config: ReviewConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.dialect, "counted");
        assert_eq!(config.username, "me");
        // Other fields should use defaults
        assert_eq!(config.target_branch, "master");
        assert_eq!(config.context_lines, 5);
    }
}
