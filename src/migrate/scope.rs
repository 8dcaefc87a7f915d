use tracing::{debug, info, warn};

use super::throttle::Throttle;
use crate::clickup::{api, Remote};
use crate::config::{split_csv, Scope};
use crate::error::{MigrateError, Result};
use crate::model::task::TaskList;

/// Turns a configured scope into the concrete lists to query.
pub struct ScopeResolver<'a> {
    remote: &'a dyn Remote,
    folder_pause: Throttle,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(remote: &'a dyn Remote, folder_pause: Throttle) -> Self {
        Self {
            remote,
            folder_pause,
        }
    }

    /// Precedence: explicit list ids, then space, then workspace. Explicit ids
    /// are trusted as given and never looked up.
    pub async fn resolve(&self, scope: &Scope) -> Result<Vec<TaskList>> {
        debug!(?scope, "resolving scope");

        if let Some(raw) = &scope.list_ids {
            let lists: Vec<TaskList> = split_csv(raw)
                .iter()
                .map(|id| TaskList::placeholder(id))
                .collect();
            info!(count = lists.len(), "using configured list ids");
            return Ok(lists);
        }

        if let Some(space_id) = &scope.space_id {
            let lists = self.lists_in_space(space_id).await?;
            info!(space_id = %space_id, count = lists.len(), "lists found in space");
            return Ok(lists);
        }

        if let Some(workspace_id) = &scope.workspace_id {
            let spaces = api::spaces(self.remote, workspace_id).await?;
            info!(workspace_id = %workspace_id, spaces = spaces.len(), "walking workspace");

            let mut lists = Vec::new();
            for space in spaces {
                match self.lists_in_space(&space.id).await {
                    Ok(found) => {
                        debug!(space = %space.name, count = found.len(), "space walked");
                        lists.extend(found);
                    }
                    Err(e) => {
                        warn!(
                            space_id = %space.id,
                            error = %e,
                            "skipping space, its lists could not be fetched"
                        );
                    }
                }
            }
            info!(workspace_id = %workspace_id, count = lists.len(), "lists found in workspace");
            return Ok(lists);
        }

        Err(MigrateError::config(
            "No scope specified. Set list ids, a space id or a workspace id in the configuration.",
        ))
    }

    /// Direct lists are required; folders are best effort.
    async fn lists_in_space(&self, space_id: &str) -> Result<Vec<TaskList>> {
        let mut lists = api::space_lists(self.remote, space_id).await?;

        let folders = match api::folders(self.remote, space_id).await {
            Ok(folders) => folders,
            Err(e) => {
                warn!(space_id, error = %e, "could not list folders, using direct lists only");
                return Ok(lists);
            }
        };

        for (i, folder) in folders.iter().enumerate() {
            if i > 0 {
                self.folder_pause.wait().await;
            }
            match api::folder_lists(self.remote, &folder.id).await {
                Ok(inside) => {
                    debug!(folder = %folder.name, count = inside.len(), "folder lists");
                    lists.extend(inside);
                }
                Err(e) => {
                    warn!(folder_id = %folder.id, error = %e, "could not list folder, continuing");
                }
            }
        }

        Ok(lists)
    }
}
