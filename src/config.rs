use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::flow::FlowSettings;

/// Configuration file structure for orgflow.
///
/// Holds the Jenkins connection, the GitHub token and the flow timings so
/// they do not have to be passed on every run. Files are looked up in the
/// current directory first, then in the platform config directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Jenkins connection settings
    #[serde(default)]
    pub jenkins: JenkinsConfig,

    /// GitHub settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Creation flow timings
    #[serde(default)]
    pub flow: FlowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JenkinsConfig {
    /// Jenkins root URL, including any context path
    #[serde(default = "default_jenkins_url")]
    pub base_url: String,

    /// Blue Ocean organization
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Jenkins user for basic authentication
    pub username: Option<String>,

    /// Jenkins API token for `username`
    pub api_token: Option<String>,

    /// Server-sent events endpoint delivering job events
    pub events_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub personal access token, used when Jenkins has no credential yet
    pub token: Option<String>,

    /// GitHub API URL (GitHub Enterprise installs differ)
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlowConfig {
    /// Minimum time a loading step stays visible, in milliseconds
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Repositories requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// How long to wait for the first organization scan, in seconds
    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,
}

impl Default for JenkinsConfig {
    fn default() -> Self {
        Self {
            base_url: default_jenkins_url(),
            organization: default_organization(),
            username: None,
            api_token: None,
            events_url: None,
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_github_api_url(),
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            page_size: default_page_size(),
            completion_timeout_secs: default_completion_timeout_secs(),
        }
    }
}

impl FlowConfig {
    pub fn settings(&self) -> FlowSettings {
        FlowSettings {
            min_delay: Duration::from_millis(self.min_delay_ms),
            page_size: self.page_size.max(1),
            completion_timeout: Duration::from_secs(self.completion_timeout_secs),
        }
    }
}

fn default_jenkins_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_organization() -> String {
    "jenkins".to_string()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_min_delay_ms() -> u64 {
    500
}

fn default_page_size() -> u32 {
    100
}

fn default_completion_timeout_secs() -> u64 {
    30
}

const CANDIDATES: [&str; 4] = ["orgflow.toml", "orgflow.json", "orgflow.yaml", "orgflow.yml"];

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./orgflow.toml, ./orgflow.json, ./orgflow.yaml, ./orgflow.yml
    /// 3. `<config dir>/orgflow/orgflow.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        for candidate in &CANDIDATES {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(path) = Self::user_config_path().filter(|p| p.exists()) {
            return Self::load_from_path(&path);
        }

        Ok(Self::default())
    }

    /// `<config dir>/orgflow/orgflow.toml`, if the platform has a config dir.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("orgflow").join("orgflow.toml"))
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
        }

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
