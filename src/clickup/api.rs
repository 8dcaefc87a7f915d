use serde_json::json;

use super::wire::{
    self, FoldersEnvelope, ListsEnvelope, RawMember, SpaceDetail, SpacesEnvelope, TasksPage,
    TeamEnvelope, TeamsEnvelope, UserEnvelope,
};
use super::Remote;
use crate::error::Result;
use crate::model::task::{Folder, Member, Space, Task, TaskList, User, Workspace};

/// What a paginated task query runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSource {
    List(String),
    Workspace(String),
}

/// One paginated `.../task` query. Each page is a separate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub source: TaskSource,
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub space_id: Option<String>,
    pub subtasks: bool,
}

impl TaskQuery {
    pub fn list(list_id: &str, status: &str) -> Self {
        Self {
            source: TaskSource::List(list_id.to_string()),
            status: Some(status.to_string()),
            assignee: None,
            space_id: None,
            subtasks: false,
        }
    }

    pub fn workspace(workspace_id: &str, status: Option<&str>) -> Self {
        Self {
            source: TaskSource::Workspace(workspace_id.to_string()),
            status: status.map(String::from),
            assignee: None,
            space_id: None,
            subtasks: false,
        }
    }

    pub fn assigned_to(mut self, assignee: Option<&str>) -> Self {
        self.assignee = assignee.map(String::from);
        self
    }

    pub fn in_space(mut self, space_id: &str) -> Self {
        self.space_id = Some(space_id.to_string());
        self
    }

    pub fn with_subtasks(mut self) -> Self {
        self.subtasks = true;
        self
    }

    pub fn page_path(&self, page: u32) -> String {
        let mut path = match &self.source {
            TaskSource::List(id) => format!("list/{id}/task"),
            TaskSource::Workspace(id) => format!("team/{id}/task"),
        };
        path.push_str(&format!("?archived=false&include_closed=true&page={page}"));
        if let Some(status) = &self.status {
            path.push_str(&format!("&statuses[]={}", urlencoding::encode(status)));
        }
        if let Some(assignee) = &self.assignee {
            path.push_str(&format!("&assignees[]={}", urlencoding::encode(assignee)));
        }
        if let Some(space_id) = &self.space_id {
            path.push_str(&format!("&space_ids[]={}", urlencoding::encode(space_id)));
        }
        if self.subtasks {
            path.push_str("&subtasks=true");
        }
        path
    }

    pub fn describe(&self) -> String {
        let scope = match &self.source {
            TaskSource::List(id) => format!("list {id}"),
            TaskSource::Workspace(id) => format!("workspace {id}"),
        };
        match &self.status {
            Some(status) => format!("{scope} status \"{status}\""),
            None => scope,
        }
    }
}

pub async fn fetch_task_page(
    remote: &dyn Remote,
    query: &TaskQuery,
    page: u32,
) -> Result<Vec<Task>> {
    let path = query.page_path(page);
    let value = remote.get(&path).await?;
    let page: TasksPage = wire::decode(&path, value)?;
    Ok(page.into_tasks())
}

pub async fn authorized_user(remote: &dyn Remote) -> Result<Option<User>> {
    let path = "user";
    let env: UserEnvelope = wire::decode(path, remote.get(path).await?)?;
    Ok(env.user.and_then(|u| u.into_user()))
}

pub async fn workspaces(remote: &dyn Remote) -> Result<Vec<Workspace>> {
    let path = "team";
    let env: TeamsEnvelope = wire::decode(path, remote.get(path).await?)?;
    Ok(env.teams.into_iter().map(|t| t.into_workspace()).collect())
}

pub async fn workspace_members(remote: &dyn Remote, workspace_id: &str) -> Result<Vec<Member>> {
    let path = format!("team/{workspace_id}");
    let env: TeamEnvelope = wire::decode(&path, remote.get(&path).await?)?;
    Ok(env
        .team
        .map(|t| t.members)
        .unwrap_or_default()
        .into_iter()
        .filter_map(RawMember::into_member)
        .collect())
}

pub async fn spaces(remote: &dyn Remote, workspace_id: &str) -> Result<Vec<Space>> {
    let path = format!("team/{workspace_id}/space?archived=false");
    let env: SpacesEnvelope = wire::decode(&path, remote.get(&path).await?)?;
    Ok(env.spaces.into_iter().map(|s| s.into_space()).collect())
}

pub async fn space_statuses(remote: &dyn Remote, space_id: &str) -> Result<Vec<String>> {
    let path = format!("space/{space_id}");
    let detail: SpaceDetail = wire::decode(&path, remote.get(&path).await?)?;
    Ok(detail.status_labels())
}

pub async fn folders(remote: &dyn Remote, space_id: &str) -> Result<Vec<Folder>> {
    let path = format!("space/{space_id}/folder?archived=false");
    let env: FoldersEnvelope = wire::decode(&path, remote.get(&path).await?)?;
    Ok(env.folders.into_iter().map(|f| f.into_folder()).collect())
}

pub async fn space_lists(remote: &dyn Remote, space_id: &str) -> Result<Vec<TaskList>> {
    let path = format!("space/{space_id}/list?archived=false");
    let env: ListsEnvelope = wire::decode(&path, remote.get(&path).await?)?;
    Ok(env.lists.into_iter().map(|l| l.into_list()).collect())
}

pub async fn folder_lists(remote: &dyn Remote, folder_id: &str) -> Result<Vec<TaskList>> {
    let path = format!("folder/{folder_id}/list?archived=false");
    let env: ListsEnvelope = wire::decode(&path, remote.get(&path).await?)?;
    Ok(env.lists.into_iter().map(|l| l.into_list()).collect())
}

pub async fn update_task_status(remote: &dyn Remote, task_id: &str, status: &str) -> Result<()> {
    let path = format!("task/{task_id}");
    remote.put(&path, &json!({ "status": status })).await?;
    Ok(())
}
