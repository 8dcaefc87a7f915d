use serde::{Deserialize, Serialize};
use std::fmt;

use super::task::{Member, SpaceCount, Task, User, Workspace};

/// Where an orchestrated run ended up. Every run starts at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunPhase {
    Idle,
    ResolvingScope,
    Aggregating,
    Updating,
    ScopedEmpty,
    Error,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => f.write_str("idle"),
            RunPhase::ResolvingScope => f.write_str("resolving-scope"),
            RunPhase::Aggregating => f.write_str("aggregating"),
            RunPhase::Updating => f.write_str("updating"),
            RunPhase::ScopedEmpty => f.write_str("scoped-empty"),
            RunPhase::Error => f.write_str("error"),
            RunPhase::Done => f.write_str("done"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub updated: usize,
    pub errors: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Vec<String>>,
    pub phase: RunPhase,
}

impl MigrationResult {
    pub fn failed(phase: RunPhase, updated: usize, message: impl Into<String>) -> Self {
        Self {
            updated,
            errors: 1,
            message: message.into(),
            error_details: None,
            phase,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    pub success: bool,
    pub message: String,
    pub tasks: Vec<Task>,
}

impl ScanResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            tasks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub teams: Vec<Workspace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembersResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusesResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub statuses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpacesResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Spaces holding at least one matching task.
    pub spaces: Vec<SpaceCount>,
    pub all_spaces: Vec<SpaceCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeResponse {
    pub success: bool,
    pub message: String,
    pub updated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl StatusChangeResponse {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            updated: 0,
            errors: None,
        }
    }
}
