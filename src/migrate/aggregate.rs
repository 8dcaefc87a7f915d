use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::throttle::Throttle;
use crate::clickup::api::{self, TaskQuery};
use crate::clickup::Remote;
use crate::error::Result;
use crate::model::task::{Task, TaskList};

/// Keeps the first task seen for each id.
pub fn dedup_tasks(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|t| seen.insert(t.id.clone()))
        .collect()
}

/// Runs paginated task queries strictly one page at a time.
pub struct Aggregator<'a> {
    remote: &'a dyn Remote,
    pacing: Throttle,
    max_pages: u32,
}

impl<'a> Aggregator<'a> {
    pub fn new(remote: &'a dyn Remote, pacing: Throttle, max_pages: u32) -> Self {
        Self {
            remote,
            pacing,
            max_pages,
        }
    }

    /// Fetches pages until one comes back empty or `max_pages` have been read.
    /// A failed page fails the whole query; a partial result is never
    /// reported as complete.
    pub async fn paginate(&self, query: &TaskQuery) -> Result<Vec<Task>> {
        let mut tasks = Vec::new();

        for page in 0..self.max_pages {
            if page > 0 {
                self.pacing.wait().await;
            }

            let batch = match api::fetch_task_page(self.remote, query, page).await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(
                        query = %query.describe(),
                        page,
                        fetched = tasks.len(),
                        error = %e,
                        "page fetch failed"
                    );
                    return Err(e);
                }
            };

            debug!(query = %query.describe(), page, count = batch.len(), "page fetched");
            if batch.is_empty() {
                return Ok(tasks);
            }
            tasks.extend(batch);
        }

        warn!(
            query = %query.describe(),
            max_pages = self.max_pages,
            "page limit reached, treating as exhausted"
        );
        Ok(tasks)
    }

    /// Per-list mode: every (list, status) pair is its own query.
    pub async fn collect_from_lists(
        &self,
        lists: &[TaskList],
        statuses: &[String],
        assignee: Option<&str>,
    ) -> Result<Vec<Task>> {
        let mut all = Vec::new();
        let mut first = true;

        for list in lists {
            for status in statuses {
                if !first {
                    self.pacing.wait().await;
                }
                first = false;

                let query = TaskQuery::list(&list.id, status).assigned_to(assignee);
                let batch = self.paginate(&query).await?;
                debug!(list = %list.name, status = %status, count = batch.len(), "list scanned");
                all.extend(batch);
            }
        }

        let tasks = dedup_tasks(all);
        info!(lists = lists.len(), count = tasks.len(), "tasks collected from lists");
        Ok(tasks)
    }

    /// Per-workspace mode: one query per status over the whole workspace.
    pub async fn collect_from_workspace(
        &self,
        workspace_id: &str,
        statuses: &[String],
        assignee: Option<&str>,
    ) -> Result<Vec<Task>> {
        let mut all = Vec::new();

        for (i, status) in statuses.iter().enumerate() {
            if i > 0 {
                self.pacing.wait().await;
            }
            let query = TaskQuery::workspace(workspace_id, Some(status)).assigned_to(assignee);
            let batch = self.paginate(&query).await?;
            info!(workspace_id, status = %status, count = batch.len(), "status scanned");
            all.extend(batch);
        }

        Ok(dedup_tasks(all))
    }

    /// Every task in the workspace regardless of status, subtasks included.
    pub async fn all_in_workspace(
        &self,
        workspace_id: &str,
        assignee: Option<&str>,
    ) -> Result<Vec<Task>> {
        let query = TaskQuery::workspace(workspace_id, None)
            .assigned_to(assignee)
            .with_subtasks();
        let tasks = dedup_tasks(self.paginate(&query).await?);
        info!(workspace_id, count = tasks.len(), "workspace scanned");
        Ok(tasks)
    }

    /// Number of distinct tasks in one space carrying any of `statuses`.
    pub async fn count_in_space(
        &self,
        workspace_id: &str,
        space_id: &str,
        statuses: &[String],
    ) -> Result<usize> {
        let mut all = Vec::new();
        for (i, status) in statuses.iter().enumerate() {
            if i > 0 {
                self.pacing.wait().await;
            }
            let query = TaskQuery::workspace(workspace_id, Some(status)).in_space(space_id);
            all.extend(self.paginate(&query).await?);
        }
        Ok(dedup_tasks(all).len())
    }
}
