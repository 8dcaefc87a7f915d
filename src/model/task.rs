use serde::{Deserialize, Serialize};

pub const UNTITLED: &str = "Sem título";
pub const NO_STATUS: &str = "sem status";
pub const UNKNOWN_LIST_ID: &str = "unknown";
pub const UNKNOWN_LIST_NAME: &str = "Lista desconhecida";
pub const UNNAMED_USER: &str = "Sem nome";
pub const DEFAULT_MEMBER_COLOR: &str = "#7b68ee";

/// Snapshot of a remote task. Never mutated locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub status: String,
    pub url: String,
    /// Only the immediate parent is tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub assignees: Vec<Assignee>,
    pub list: TaskList,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: String,
    pub name: String,
}

impl TaskList {
    /// A list known only by id, as given in configuration.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: format!("Lista {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub username: String,
    pub email: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceCount {
    pub id: String,
    pub name: String,
    pub task_count: usize,
    pub color: Option<String>,
}
