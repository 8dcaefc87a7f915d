use tracing::{info, warn};

use super::throttle::Throttle;
use crate::clickup::{api, Remote};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub updated: usize,
    /// `"<task id>: <reason>"` for every failed update, in attempt order.
    pub errors: Vec<String>,
}

impl UpdateOutcome {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Moves each task to `target`, one request at a time. A failure is recorded
/// and the batch carries on.
pub async fn apply_status(
    remote: &dyn Remote,
    pacing: Throttle,
    task_ids: &[String],
    target: &str,
) -> UpdateOutcome {
    let mut outcome = UpdateOutcome::default();

    for (i, task_id) in task_ids.iter().enumerate() {
        match api::update_task_status(remote, task_id, target).await {
            Ok(()) => {
                outcome.updated += 1;
                info!(task_id = %task_id, status = target, "task updated");
                if i + 1 < task_ids.len() {
                    pacing.wait().await;
                }
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "task update failed");
                outcome.errors.push(format!("{task_id}: {}", e.user_message()));
            }
        }
    }

    outcome
}
