//! Response shapes of the ClickUp endpoints we call. Every defaulting rule for
//! missing fields lives here; the rest of the crate only sees `model::task`.

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{MigrateError, Result};
use crate::model::task::{
    Assignee, Folder, Member, Space, Task, TaskList, User, Workspace, DEFAULT_MEMBER_COLOR,
    NO_STATUS, UNKNOWN_LIST_ID, UNKNOWN_LIST_NAME, UNNAMED_USER, UNTITLED,
};

pub fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|source| MigrateError::Decode {
        path: path.to_string(),
        source,
    })
}

/// Pull `err` or `error` out of an error body, if it is JSON at all.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["err", "error"]
        .iter()
        .filter_map(|key| value.get(key))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        })
}

/// ClickUp mixes numeric and string ids depending on the endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    pub fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TasksPage {
    #[serde(default)]
    pub tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
pub struct RawTask {
    pub id: Option<RawId>,
    pub name: Option<String>,
    pub status: Option<RawStatus>,
    pub url: Option<String>,
    pub parent: Option<String>,
    #[serde(default)]
    pub assignees: Vec<RawAssignee>,
    pub list: Option<RawListRef>,
}

#[derive(Debug, Deserialize)]
pub struct RawStatus {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawAssignee {
    pub id: Option<RawId>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawListRef {
    pub id: Option<RawId>,
    pub name: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl RawTask {
    /// `None` when the remote sent a task without an id; nothing can be done
    /// with such a task.
    pub fn into_task(self) -> Option<Task> {
        let id = self.id?.into_string();
        let list = self.list.map_or_else(
            || TaskList {
                id: UNKNOWN_LIST_ID.to_string(),
                name: UNKNOWN_LIST_NAME.to_string(),
            },
            |l| TaskList {
                id: l
                    .id
                    .map(RawId::into_string)
                    .unwrap_or_else(|| UNKNOWN_LIST_ID.to_string()),
                name: non_blank(l.name).unwrap_or_else(|| UNKNOWN_LIST_NAME.to_string()),
            },
        );

        Some(Task {
            id,
            name: non_blank(self.name).unwrap_or_else(|| UNTITLED.to_string()),
            status: non_blank(self.status.and_then(|s| s.status))
                .unwrap_or_else(|| NO_STATUS.to_string()),
            url: self.url.unwrap_or_default(),
            parent: non_blank(self.parent),
            assignees: self
                .assignees
                .into_iter()
                .filter_map(|a| {
                    Some(Assignee {
                        id: a.id?.into_string(),
                        username: non_blank(a.username)
                            .unwrap_or_else(|| UNNAMED_USER.to_string()),
                    })
                })
                .collect(),
            list,
        })
    }
}

impl TasksPage {
    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks.into_iter().filter_map(RawTask::into_task).collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SpacesEnvelope {
    #[serde(default)]
    pub spaces: Vec<RawNamed>,
}

#[derive(Debug, Deserialize)]
pub struct FoldersEnvelope {
    #[serde(default)]
    pub folders: Vec<RawNamed>,
}

#[derive(Debug, Deserialize)]
pub struct ListsEnvelope {
    #[serde(default)]
    pub lists: Vec<RawNamed>,
}

#[derive(Debug, Deserialize)]
pub struct TeamsEnvelope {
    #[serde(default)]
    pub teams: Vec<RawNamed>,
}

/// Spaces, folders, lists and teams all share this shape.
#[derive(Debug, Deserialize)]
pub struct RawNamed {
    pub id: RawId,
    pub name: Option<String>,
    pub color: Option<String>,
}

impl RawNamed {
    fn split(self) -> (String, String, Option<String>) {
        let id = self.id.into_string();
        let name = non_blank(self.name).unwrap_or_else(|| id.clone());
        (id, name, non_blank(self.color))
    }

    pub fn into_space(self) -> Space {
        let (id, name, color) = self.split();
        Space { id, name, color }
    }

    pub fn into_folder(self) -> Folder {
        let (id, name, _) = self.split();
        Folder { id, name }
    }

    pub fn into_list(self) -> TaskList {
        let (id, name, _) = self.split();
        TaskList { id, name }
    }

    pub fn into_workspace(self) -> Workspace {
        let (id, name, color) = self.split();
        Workspace { id, name, color }
    }
}

#[derive(Debug, Deserialize)]
pub struct TeamEnvelope {
    pub team: Option<TeamDetail>,
}

#[derive(Debug, Deserialize)]
pub struct TeamDetail {
    #[serde(default)]
    pub members: Vec<RawMember>,
}

#[derive(Debug, Deserialize)]
pub struct RawMember {
    pub id: Option<RawId>,
    pub user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
pub struct UserEnvelope {
    pub user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
pub struct RawUser {
    pub id: Option<RawId>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub color: Option<String>,
}

impl RawMember {
    pub fn into_member(self) -> Option<Member> {
        let (user_id, username, email, color) = match self.user {
            Some(u) => (u.id, u.username, u.email, u.color),
            None => (None, None, None, None),
        };
        let id = user_id.or(self.id)?.into_string();
        Some(Member {
            id,
            username: non_blank(username).unwrap_or_else(|| UNNAMED_USER.to_string()),
            email: email.unwrap_or_default(),
            color: non_blank(color).unwrap_or_else(|| DEFAULT_MEMBER_COLOR.to_string()),
        })
    }
}

impl RawUser {
    pub fn into_user(self) -> Option<User> {
        Some(User {
            id: self.id?.into_string(),
            username: non_blank(self.username).unwrap_or_else(|| UNNAMED_USER.to_string()),
            email: non_blank(self.email),
            color: non_blank(self.color),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SpaceDetail {
    #[serde(default)]
    pub statuses: Vec<StatusEntry>,
}

/// `/space/{id}` reports statuses either flat or nested in groups.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StatusEntry {
    Group { statuses: Vec<StatusEntry> },
    Single { status: String },
    Other(IgnoredAny),
}

impl SpaceDetail {
    /// Flattened labels in first-seen order, without repeats.
    pub fn status_labels(self) -> Vec<String> {
        fn walk(entries: Vec<StatusEntry>, out: &mut Vec<String>) {
            for entry in entries {
                match entry {
                    StatusEntry::Group { statuses } => walk(statuses, out),
                    StatusEntry::Single { status } => {
                        if !status.is_empty() && !out.contains(&status) {
                            out.push(status);
                        }
                    }
                    StatusEntry::Other(_) => {}
                }
            }
        }

        let mut out = Vec::new();
        walk(self.statuses, &mut out);
        out
    }
}
