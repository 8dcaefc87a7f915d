pub mod aggregate;
pub mod scope;
pub mod throttle;
pub mod update;

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::clickup::{api, Remote};
use crate::config::{AppConfig, Scope};
use crate::error::Result;
use crate::model::outcome::{
    MembersResponse, MigrationResult, RunPhase, ScanResponse, SpacesResponse,
    StatusChangeResponse, StatusesResponse, TeamsResponse, UserResponse,
};
use crate::model::task::{SpaceCount, Task, NO_STATUS};

use aggregate::Aggregator;
use scope::ScopeResolver;
use throttle::Throttle;
use update::apply_status;

const MISSING_TOKEN: &str = "Token is missing. Set it in the configuration.";
const MISSING_WORKSPACE: &str = "Workspace id is not configured.";
const MISSING_SOURCE_STATUS: &str = "Source status is not configured.";
const NO_LISTS: &str = "No lists found for the configured scope.";

/// Tracks the phase of one orchestrated run.
struct Run {
    phase: RunPhase,
}

impl Run {
    fn start() -> Self {
        Self {
            phase: RunPhase::Idle,
        }
    }

    fn enter(&mut self, next: RunPhase) {
        debug!(from = %self.phase, to = %next, "run phase");
        self.phase = next;
    }
}

enum Matched {
    NoLists,
    Tasks(Vec<Task>),
}

/// Entry points for every operation. Configuration is read-only and supplied
/// by the caller; nothing survives between calls.
pub struct Migrator<'a> {
    config: &'a AppConfig,
    remote: &'a dyn Remote,
}

impl<'a> Migrator<'a> {
    pub fn new(config: &'a AppConfig, remote: &'a dyn Remote) -> Self {
        Self { config, remote }
    }

    fn pacing(&self) -> Throttle {
        Throttle::new(self.config.limits.request_delay())
    }

    fn aggregator(&self) -> Aggregator<'a> {
        Aggregator::new(self.remote, self.pacing(), self.config.limits.max_pages)
    }

    fn resolver(&self) -> ScopeResolver<'a> {
        ScopeResolver::new(self.remote, Throttle::new(self.config.limits.folder_delay()))
    }

    fn has_token(&self) -> bool {
        self.config.token().is_some()
    }

    fn workspace_or_configured(&self, workspace_id: Option<&str>) -> Option<String> {
        workspace_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .or_else(|| self.config.workspace_id())
    }

    /// Workspace-wide queries when nothing narrows the scope, otherwise a
    /// list-by-list walk.
    async fn collect_matching(
        &self,
        scope: &Scope,
        statuses: &[String],
        assignee: Option<&str>,
        run: &mut Run,
    ) -> Result<Matched> {
        let aggregator = self.aggregator();

        if scope.is_workspace_wide() {
            if let Some(workspace_id) = &scope.workspace_id {
                run.enter(RunPhase::Aggregating);
                let tasks = aggregator
                    .collect_from_workspace(workspace_id, statuses, assignee)
                    .await?;
                return Ok(Matched::Tasks(tasks));
            }
        }

        run.enter(RunPhase::ResolvingScope);
        let lists = self.resolver().resolve(scope).await?;
        if lists.is_empty() {
            return Ok(Matched::NoLists);
        }

        run.enter(RunPhase::Aggregating);
        let tasks = aggregator
            .collect_from_lists(&lists, statuses, assignee)
            .await?;
        Ok(Matched::Tasks(tasks))
    }

    /// Moves every task in one of the configured source statuses to the
    /// configured target status.
    pub async fn run_migration(&self) -> MigrationResult {
        let mut run = Run::start();

        if !self.has_token() {
            run.enter(RunPhase::Error);
            return MigrationResult::failed(run.phase, 0, MISSING_TOKEN);
        }
        let statuses = self.config.source_statuses();
        let target = match self.config.target_status() {
            Some(target) if !statuses.is_empty() => target,
            _ => {
                run.enter(RunPhase::Error);
                return MigrationResult::failed(
                    run.phase,
                    0,
                    "Set both the source and the target status in the configuration.",
                );
            }
        };

        let scope = self.config.scope();
        let tasks = match self.collect_matching(&scope, &statuses, None, &mut run).await {
            Ok(Matched::Tasks(tasks)) => tasks,
            Ok(Matched::NoLists) => {
                run.enter(RunPhase::ScopedEmpty);
                return MigrationResult::failed(run.phase, 0, NO_LISTS);
            }
            Err(e) => {
                warn!(error = %e, "migration aborted");
                run.enter(RunPhase::Error);
                return MigrationResult::failed(run.phase, 0, e.user_message());
            }
        };

        if tasks.is_empty() {
            run.enter(RunPhase::ScopedEmpty);
            return MigrationResult {
                updated: 0,
                errors: 0,
                message: format!("No tasks found with status {}.", statuses.join(", ")),
                error_details: None,
                phase: run.phase,
            };
        }

        run.enter(RunPhase::Updating);
        let ids: Vec<String> = tasks.into_iter().map(|t| t.id).collect();
        let outcome = apply_status(self.remote, self.pacing(), &ids, &target).await;
        run.enter(RunPhase::Done);

        info!(
            scanned = ids.len(),
            updated = outcome.updated,
            failed = outcome.errors.len(),
            "migration finished"
        );

        if outcome.is_complete() {
            MigrationResult {
                updated: outcome.updated,
                errors: 0,
                message: format!("{} task(s) moved to \"{target}\".", outcome.updated),
                error_details: None,
                phase: run.phase,
            }
        } else {
            MigrationResult {
                updated: outcome.updated,
                errors: outcome.errors.len(),
                message: format!(
                    "{} task(s) moved to \"{target}\", {} failed.",
                    outcome.updated,
                    outcome.errors.len()
                ),
                error_details: Some(outcome.errors),
                phase: run.phase,
            }
        }
    }

    /// Lists tasks in the configured source statuses without touching them.
    pub async fn scan_tasks(&self, assignee: Option<&str>) -> ScanResponse {
        if !self.has_token() {
            return ScanResponse::failure(MISSING_TOKEN);
        }
        let statuses = self.config.source_statuses();
        if statuses.is_empty() {
            return ScanResponse::failure(MISSING_SOURCE_STATUS);
        }

        let mut run = Run::start();
        match self
            .collect_matching(&self.config.scope(), &statuses, assignee, &mut run)
            .await
        {
            Ok(Matched::Tasks(tasks)) => ScanResponse {
                success: true,
                message: format!("{} task(s) found", tasks.len()),
                tasks,
            },
            Ok(Matched::NoLists) => ScanResponse::failure(NO_LISTS),
            Err(e) => {
                warn!(error = %e, "scan failed");
                ScanResponse::failure(e.user_message())
            }
        }
    }

    /// Every task in the configured workspace, whatever its status.
    pub async fn scan_all_tasks(&self, assignee: Option<&str>) -> ScanResponse {
        if !self.has_token() {
            return ScanResponse::failure(MISSING_TOKEN);
        }
        let Some(workspace_id) = self.config.workspace_id() else {
            return ScanResponse::failure(MISSING_WORKSPACE);
        };

        match self.aggregator().all_in_workspace(&workspace_id, assignee).await {
            Ok(tasks) => ScanResponse {
                success: true,
                message: format!("{} task(s) found", tasks.len()),
                tasks,
            },
            Err(e) => {
                warn!(error = %e, "workspace scan failed");
                ScanResponse::failure(e.user_message())
            }
        }
    }

    pub async fn current_user(&self) -> UserResponse {
        if !self.has_token() {
            return UserResponse {
                success: false,
                message: Some(MISSING_TOKEN.into()),
                user: None,
            };
        }
        match api::authorized_user(self.remote).await {
            Ok(user) => UserResponse {
                success: true,
                message: None,
                user,
            },
            Err(e) => UserResponse {
                success: false,
                message: Some(e.user_message()),
                user: None,
            },
        }
    }

    pub async fn workspaces(&self) -> TeamsResponse {
        if !self.has_token() {
            return TeamsResponse {
                success: false,
                message: Some(MISSING_TOKEN.into()),
                teams: Vec::new(),
            };
        }
        match api::workspaces(self.remote).await {
            Ok(teams) => TeamsResponse {
                success: true,
                message: None,
                teams,
            },
            Err(e) => TeamsResponse {
                success: false,
                message: Some(e.user_message()),
                teams: Vec::new(),
            },
        }
    }

    pub async fn workspace_members(&self, workspace_id: Option<&str>) -> MembersResponse {
        let workspace_id = match self.workspace_or_configured(workspace_id) {
            Some(id) if self.has_token() => id,
            _ => {
                return MembersResponse {
                    success: false,
                    message: Some("Token or workspace id missing.".into()),
                    members: Vec::new(),
                }
            }
        };
        match api::workspace_members(self.remote, &workspace_id).await {
            Ok(members) => MembersResponse {
                success: true,
                message: None,
                members,
            },
            Err(e) => MembersResponse {
                success: false,
                message: Some(e.user_message()),
                members: Vec::new(),
            },
        }
    }

    /// Distinct statuses seen on the workspace's tasks, sorted.
    pub async fn all_statuses(&self, workspace_id: Option<&str>) -> StatusesResponse {
        let workspace_id = match self.workspace_or_configured(workspace_id) {
            Some(id) if self.has_token() => id,
            _ => {
                return StatusesResponse {
                    success: false,
                    message: Some("Token or workspace id missing.".into()),
                    statuses: Vec::new(),
                }
            }
        };

        match self.aggregator().all_in_workspace(&workspace_id, None).await {
            Ok(tasks) => {
                let statuses: BTreeSet<String> = tasks
                    .into_iter()
                    .map(|t| t.status)
                    .filter(|s| s != NO_STATUS)
                    .collect();
                StatusesResponse {
                    success: true,
                    message: None,
                    statuses: statuses.into_iter().collect(),
                }
            }
            Err(e) => StatusesResponse {
                success: false,
                message: Some(e.user_message()),
                statuses: Vec::new(),
            },
        }
    }

    /// Statuses defined on one space.
    pub async fn space_statuses(&self, space_id: &str) -> StatusesResponse {
        if !self.has_token() {
            return StatusesResponse {
                success: false,
                message: Some(MISSING_TOKEN.into()),
                statuses: Vec::new(),
            };
        }
        match api::space_statuses(self.remote, space_id).await {
            Ok(statuses) => StatusesResponse {
                success: true,
                message: None,
                statuses,
            },
            Err(e) => StatusesResponse {
                success: false,
                message: Some(e.user_message()),
                statuses: Vec::new(),
            },
        }
    }

    /// Per-space counts of tasks in the configured source statuses.
    pub async fn spaces_with_counts(&self, workspace_id: Option<&str>) -> SpacesResponse {
        let failure = |message: String| SpacesResponse {
            success: false,
            message: Some(message),
            spaces: Vec::new(),
            all_spaces: Vec::new(),
        };

        let workspace_id = match self.workspace_or_configured(workspace_id) {
            Some(id) if self.has_token() => id,
            _ => return failure("Token or workspace id missing.".into()),
        };
        let statuses = self.config.source_statuses();
        if statuses.is_empty() {
            return failure(MISSING_SOURCE_STATUS.into());
        }

        let spaces = match api::spaces(self.remote, &workspace_id).await {
            Ok(spaces) => spaces,
            Err(e) => return failure(e.user_message()),
        };

        let aggregator = self.aggregator();
        let mut all_spaces = Vec::with_capacity(spaces.len());
        for space in spaces {
            let task_count = match aggregator
                .count_in_space(&workspace_id, &space.id, &statuses)
                .await
            {
                Ok(count) => count,
                Err(e) if e.is_auth() => return failure(e.user_message()),
                Err(e) => {
                    warn!(space_id = %space.id, error = %e, "could not count space tasks");
                    0
                }
            };
            all_spaces.push(SpaceCount {
                id: space.id,
                name: space.name,
                task_count,
                color: space.color,
            });
        }

        SpacesResponse {
            success: true,
            message: None,
            spaces: all_spaces
                .iter()
                .filter(|s| s.task_count > 0)
                .cloned()
                .collect(),
            all_spaces,
        }
    }

    /// Applies `target` to the given tasks, chosen by the user at call time.
    pub async fn change_status(&self, task_ids: &[String], target: &str) -> StatusChangeResponse {
        if !self.has_token() {
            return StatusChangeResponse::rejected(MISSING_TOKEN);
        }
        let target = target.trim();
        if target.is_empty() {
            return StatusChangeResponse::rejected("Target status not provided.");
        }
        if task_ids.is_empty() {
            return StatusChangeResponse::rejected("No tasks selected.");
        }

        info!(count = task_ids.len(), status = target, "changing task status");
        let outcome = apply_status(self.remote, self.pacing(), task_ids, target).await;

        if outcome.is_complete() {
            StatusChangeResponse {
                success: true,
                message: format!("{} task(s) moved to \"{target}\".", outcome.updated),
                updated: outcome.updated,
                errors: None,
            }
        } else {
            StatusChangeResponse {
                success: false,
                message: format!(
                    "{} task(s) moved to \"{target}\", {} error(s).",
                    outcome.updated,
                    outcome.errors.len()
                ),
                updated: outcome.updated,
                errors: Some(outcome.errors),
            }
        }
    }

    /// `change_status` with the configured target status.
    pub async fn close_tasks(&self, task_ids: &[String]) -> StatusChangeResponse {
        match self.config.target_status() {
            Some(target) => self.change_status(task_ids, &target).await,
            None => StatusChangeResponse::rejected("Target status is not configured."),
        }
    }
}
