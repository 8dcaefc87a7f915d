use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.clickup.com/api/v2";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub token: String,
    pub workspace_id: String,
    /// Comma-separated source statuses, matched exactly and in order.
    pub from_status: String,
    pub to_status: String,
    /// Comma-separated list ids. Takes precedence over `space_id`.
    pub list_ids: String,
    pub space_id: String,
    pub limits: Limits,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub request_delay_ms: u64,
    pub folder_delay_ms: u64,
    pub max_pages: u32,
    pub timeout_secs: u64,
    pub api_base: String,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            request_delay_ms: 150,
            folder_delay_ms: 100,
            max_pages: 200,
            timeout_secs: 20,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl Limits {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn folder_delay(&self) -> Duration {
        Duration::from_millis(self.folder_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where to look for tasks. At most one of `list_ids` / `space_id` narrows
/// the search; with neither, the whole workspace is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub workspace_id: Option<String>,
    pub space_id: Option<String>,
    pub list_ids: Option<String>,
}

impl Scope {
    /// True when neither lists nor a space narrow the workspace.
    pub fn is_workspace_wide(&self) -> bool {
        self.list_ids.is_none() && self.space_id.is_none()
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split a comma-joined config value, dropping blanks but keeping order.
pub fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl AppConfig {
    pub fn token(&self) -> Option<String> {
        non_empty(&self.token)
    }

    pub fn workspace_id(&self) -> Option<String> {
        non_empty(&self.workspace_id)
    }

    pub fn target_status(&self) -> Option<String> {
        non_empty(&self.to_status)
    }

    pub fn source_statuses(&self) -> Vec<String> {
        split_csv(&self.from_status)
    }

    pub fn scope(&self) -> Scope {
        Scope {
            workspace_id: self.workspace_id(),
            space_id: non_empty(&self.space_id),
            list_ids: non_empty(&self.list_ids),
        }
    }
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".taskmove")
}

pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}
