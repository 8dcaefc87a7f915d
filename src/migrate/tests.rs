use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::aggregate::Aggregator;
use super::scope::ScopeResolver;
use super::throttle::Throttle;
use super::update::apply_status;
use super::Migrator;
use crate::clickup::api::TaskQuery;
use crate::clickup::Remote;
use crate::config::{AppConfig, Limits, Scope};
use crate::error::{MigrateError, Result, AUTH_FAILED_MESSAGE};
use crate::model::outcome::RunPhase;
use crate::model::task::TaskList;

/// In-memory remote answering from a script. Unscripted GETs answer `{}`,
/// which every endpoint reads as "nothing there".
#[derive(Default)]
struct ScriptedRemote {
    replies: HashMap<String, Value>,
    failures: HashMap<String, (u16, String)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRemote {
    fn new() -> Self {
        Self::default()
    }

    fn reply(mut self, path: &str, value: Value) -> Self {
        self.replies.insert(path.to_string(), value);
        self
    }

    fn fail(mut self, path: &str, status: u16, message: &str) -> Self {
        self.failures
            .insert(path.to_string(), (status, message.to_string()));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, path: &str) -> Result<Value> {
        if let Some((status, message)) = self.failures.get(path) {
            if *status == 401 {
                return Err(MigrateError::Authentication(message.clone()));
            }
            return Err(MigrateError::Remote {
                status: *status,
                message: message.clone(),
            });
        }
        Ok(self.replies.get(path).cloned().unwrap_or_else(|| json!({})))
    }
}

#[async_trait]
impl Remote for ScriptedRemote {
    async fn get(&self, path: &str) -> Result<Value> {
        self.calls.lock().unwrap().push(format!("GET {path}"));
        self.answer(path)
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("PUT {path} {body}"));
        self.answer(path)
    }
}

fn task_json(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Task {id}"),
        "status": {"status": status},
        "url": format!("https://app.clickup.com/t/{id}"),
        "list": {"id": "L1", "name": "Backlog"}
    })
}

fn page(ids: &[&str], status: &str) -> Value {
    json!({ "tasks": ids.iter().map(|id| task_json(id, status)).collect::<Vec<_>>() })
}

fn list_page(list: &str, status: &str, n: u32) -> String {
    TaskQuery::list(list, status).page_path(n)
}

fn ws_page(ws: &str, status: &str, n: u32) -> String {
    TaskQuery::workspace(ws, Some(status)).page_path(n)
}

fn config() -> AppConfig {
    AppConfig {
        token: "pk_test".into(),
        workspace_id: "W1".into(),
        from_status: "complete".into(),
        to_status: "closed".into(),
        limits: Limits {
            request_delay_ms: 0,
            folder_delay_ms: 0,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

// --- pagination ---

#[tokio::test]
async fn pagination_stops_at_first_empty_page() {
    let remote = ScriptedRemote::new()
        .reply(&list_page("L1", "complete", 0), page(&["a", "b"], "complete"))
        .reply(&list_page("L1", "complete", 1), page(&["c", "d"], "complete"))
        .reply(&list_page("L1", "complete", 2), page(&["e"], "complete"));

    let aggregator = Aggregator::new(&remote, Throttle::none(), 200);
    let tasks = aggregator
        .paginate(&TaskQuery::list("L1", "complete"))
        .await
        .unwrap();

    let got: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(got, vec!["a", "b", "c", "d", "e"]);
    assert_eq!(remote.calls().len(), 4);
    assert_eq!(remote.calls()[3], format!("GET {}", list_page("L1", "complete", 3)));
}

#[tokio::test]
async fn pagination_respects_page_limit() {
    let mut remote = ScriptedRemote::new();
    for n in 0..10 {
        let id = format!("t{n}");
        remote = remote.reply(&list_page("L1", "complete", n), page(&[id.as_str()], "complete"));
    }

    let aggregator = Aggregator::new(&remote, Throttle::none(), 3);
    let tasks = aggregator
        .paginate(&TaskQuery::list("L1", "complete"))
        .await
        .unwrap();

    assert_eq!(tasks.len(), 3);
    assert_eq!(remote.calls().len(), 3);
}

#[tokio::test]
async fn failed_page_fails_the_query() {
    let remote = ScriptedRemote::new()
        .reply(&ws_page("W1", "complete", 0), page(&["a"], "complete"))
        .fail(&ws_page("W1", "complete", 1), 500, "Internal error");

    let aggregator = Aggregator::new(&remote, Throttle::none(), 200);
    let err = aggregator
        .paginate(&TaskQuery::workspace("W1", Some("complete")))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Internal error");
    assert_eq!(remote.calls().len(), 2);
}

#[tokio::test]
async fn auth_failure_on_page_propagates() {
    let remote = ScriptedRemote::new()
        .fail(&ws_page("W1", "complete", 0), 401, "Token invalid");

    let aggregator = Aggregator::new(&remote, Throttle::none(), 200);
    let err = aggregator
        .paginate(&TaskQuery::workspace("W1", Some("complete")))
        .await
        .unwrap_err();
    assert!(err.is_auth());
}

// --- deduplication ---

#[tokio::test]
async fn overlapping_statuses_yield_each_task_once() {
    let remote = ScriptedRemote::new()
        .reply(&ws_page("W1", "complete", 0), page(&["a", "b"], "complete"))
        .reply(&ws_page("W1", "done", 0), page(&["b", "c"], "done"));

    let aggregator = Aggregator::new(&remote, Throttle::none(), 200);
    let tasks = aggregator
        .collect_from_workspace("W1", &ids(&["complete", "done"]), None)
        .await
        .unwrap();

    let got: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(got, vec!["a", "b", "c"]);
    assert_eq!(tasks[1].status, "complete");
}

#[tokio::test]
async fn overlapping_lists_yield_each_task_once() {
    let remote = ScriptedRemote::new()
        .reply(&list_page("A", "complete", 0), page(&["x", "y"], "complete"))
        .reply(&list_page("B", "complete", 0), page(&["y", "z"], "complete"));

    let lists = vec![TaskList::placeholder("A"), TaskList::placeholder("B")];
    let aggregator = Aggregator::new(&remote, Throttle::none(), 200);
    let tasks = aggregator
        .collect_from_lists(&lists, &ids(&["complete"]), None)
        .await
        .unwrap();

    let unique: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(tasks.len(), 3);
    assert_eq!(unique.len(), 3);
}

#[tokio::test]
async fn assignee_filter_reaches_query() {
    let path = TaskQuery::workspace("W1", Some("complete"))
        .assigned_to(Some("42"))
        .page_path(0);
    let remote = ScriptedRemote::new().reply(&path, page(&["mine"], "complete"));

    let aggregator = Aggregator::new(&remote, Throttle::none(), 200);
    let tasks = aggregator
        .collect_from_workspace("W1", &ids(&["complete"]), Some("42"))
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(remote.calls()[0].contains("assignees[]=42"));
}

// --- scope resolution ---

#[tokio::test]
async fn list_ids_win_over_space_without_remote_calls() {
    let remote = ScriptedRemote::new();
    let scope = Scope {
        workspace_id: Some("W1".into()),
        space_id: Some("S".into()),
        list_ids: Some("A, B".into()),
    };

    let lists = ScopeResolver::new(&remote, Throttle::none())
        .resolve(&scope)
        .await
        .unwrap();

    let got: Vec<&str> = lists.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(got, vec!["A", "B"]);
    assert_eq!(lists[0].name, "Lista A");
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn folder_failure_keeps_direct_lists() {
    let remote = ScriptedRemote::new()
        .reply(
            "space/S/list?archived=false",
            json!({"lists": [{"id": "D1", "name": "Direct"}]}),
        )
        .fail("space/S/folder?archived=false", 403, "Forbidden");

    let scope = Scope {
        space_id: Some("S".into()),
        ..Default::default()
    };
    let lists = ScopeResolver::new(&remote, Throttle::none())
        .resolve(&scope)
        .await
        .unwrap();

    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].id, "D1");
}

#[tokio::test]
async fn one_bad_folder_does_not_hide_siblings() {
    let remote = ScriptedRemote::new()
        .reply(
            "space/S/folder?archived=false",
            json!({"folders": [{"id": "F1", "name": "One"}, {"id": "F2", "name": "Two"}]}),
        )
        .fail("folder/F1/list?archived=false", 500, "boom")
        .reply(
            "folder/F2/list?archived=false",
            json!({"lists": [{"id": "L2", "name": "In two"}]}),
        );

    let scope = Scope {
        space_id: Some("S".into()),
        ..Default::default()
    };
    let lists = ScopeResolver::new(&remote, Throttle::none())
        .resolve(&scope)
        .await
        .unwrap();

    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].id, "L2");
}

#[tokio::test]
async fn space_direct_list_failure_is_fatal() {
    let remote = ScriptedRemote::new()
        .fail("space/S/list?archived=false", 404, "Space not found");
    let scope = Scope {
        space_id: Some("S".into()),
        ..Default::default()
    };
    let err = ScopeResolver::new(&remote, Throttle::none())
        .resolve(&scope)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Space not found");
}

#[tokio::test]
async fn workspace_walk_skips_broken_space() {
    let remote = ScriptedRemote::new()
        .reply(
            "team/W1/space?archived=false",
            json!({"spaces": [{"id": "S1", "name": "Ops"}, {"id": "S2", "name": "Dev"}]}),
        )
        .fail("space/S1/list?archived=false", 500, "boom")
        .reply(
            "space/S2/list?archived=false",
            json!({"lists": [{"id": "L9", "name": "Sprint"}]}),
        );

    let scope = Scope {
        workspace_id: Some("W1".into()),
        ..Default::default()
    };
    let lists = ScopeResolver::new(&remote, Throttle::none())
        .resolve(&scope)
        .await
        .unwrap();
    assert_eq!(lists, vec![TaskList { id: "L9".into(), name: "Sprint".into() }]);
}

#[tokio::test]
async fn workspace_space_listing_failure_is_fatal() {
    let remote = ScriptedRemote::new().fail("team/W1/space?archived=false", 500, "down");
    let scope = Scope {
        workspace_id: Some("W1".into()),
        ..Default::default()
    };
    assert!(ScopeResolver::new(&remote, Throttle::none())
        .resolve(&scope)
        .await
        .is_err());
}

#[tokio::test]
async fn empty_scope_fails_before_any_call() {
    let remote = ScriptedRemote::new();
    let err = ScopeResolver::new(&remote, Throttle::none())
        .resolve(&Scope::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::Configuration(_)));
    assert!(remote.calls().is_empty());
}

// --- bulk update ---

#[tokio::test]
async fn bulk_update_continues_past_failures() {
    let remote = ScriptedRemote::new()
        .fail("task/t2", 400, "Status does not exist")
        .fail("task/t4", 500, "Internal error");

    let outcome = apply_status(
        &remote,
        Throttle::none(),
        &ids(&["t1", "t2", "t3", "t4", "t5"]),
        "closed",
    )
    .await;

    assert_eq!(outcome.updated, 3);
    assert_eq!(
        outcome.errors,
        vec!["t2: Status does not exist", "t4: Internal error"]
    );
    assert!(!outcome.is_complete());

    let calls = remote.calls();
    assert_eq!(calls.len(), 5);
    assert!(calls.iter().all(|c| c.starts_with("PUT task/t")));
    assert!(calls[0].ends_with(r#"{"status":"closed"}"#));
}

// --- orchestrator ---

#[tokio::test]
async fn migration_without_token_makes_no_calls() {
    let remote = ScriptedRemote::new();
    let cfg = AppConfig {
        token: "  ".into(),
        ..config()
    };
    let result = Migrator::new(&cfg, &remote).run_migration().await;
    assert_eq!(result.errors, 1);
    assert_eq!(result.phase, RunPhase::Error);
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn migration_requires_both_statuses() {
    let remote = ScriptedRemote::new();
    let cfg = AppConfig {
        to_status: String::new(),
        ..config()
    };
    let result = Migrator::new(&cfg, &remote).run_migration().await;
    assert_eq!(result.errors, 1);
    assert!(result.message.contains("target status"));
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn migration_uses_workspace_fast_path() {
    let remote = ScriptedRemote::new()
        .reply(&ws_page("W1", "complete", 0), page(&["a", "b"], "complete"))
        .reply(&ws_page("W1", "done", 0), page(&["b", "c"], "done"))
        .fail("task/c", 400, "Status does not exist");
    let cfg = AppConfig {
        from_status: "complete,done".into(),
        ..config()
    };

    let result = Migrator::new(&cfg, &remote).run_migration().await;

    assert_eq!(result.updated, 2);
    assert_eq!(result.errors, 1);
    assert_eq!(result.phase, RunPhase::Done);
    assert_eq!(
        result.error_details,
        Some(vec!["c: Status does not exist".to_string()])
    );
    let calls = remote.calls();
    assert!(!calls.iter().any(|c| c.contains("/space")));
    assert_eq!(calls.iter().filter(|c| c.starts_with("PUT")).count(), 3);
}

#[tokio::test]
async fn migration_with_list_ids_never_queries_workspace() {
    let remote = ScriptedRemote::new()
        .reply(&list_page("A", "complete", 0), page(&["a"], "complete"));
    let cfg = AppConfig {
        list_ids: "A".into(),
        space_id: "S".into(),
        ..config()
    };

    let result = Migrator::new(&cfg, &remote).run_migration().await;

    assert_eq!(result.updated, 1);
    assert_eq!(result.errors, 0);
    assert!(result.error_details.is_none());
    assert!(!remote.calls().iter().any(|c| c.contains("team/")));
}

#[tokio::test]
async fn migration_reports_list_page_failure_without_updating() {
    let remote = ScriptedRemote::new()
        .reply(&list_page("A", "complete", 0), page(&["a"], "complete"))
        .fail(&list_page("A", "complete", 1), 500, "Internal error");
    let cfg = AppConfig {
        list_ids: "A".into(),
        ..config()
    };

    let result = Migrator::new(&cfg, &remote).run_migration().await;

    assert_eq!(result.phase, RunPhase::Error);
    assert_eq!(result.updated, 0);
    assert_eq!(result.errors, 1);
    assert_eq!(result.message, "Internal error");
    assert!(!remote.calls().iter().any(|c| c.starts_with("PUT")));
}

#[tokio::test]
async fn migration_with_unreachable_list_is_not_scoped_empty() {
    let remote = ScriptedRemote::new()
        .fail(&list_page("A", "complete", 0), 404, "List not found");
    let cfg = AppConfig {
        list_ids: "A".into(),
        ..config()
    };

    let result = Migrator::new(&cfg, &remote).run_migration().await;

    assert_eq!(result.phase, RunPhase::Error);
    assert_eq!(result.errors, 1);
    assert_eq!(result.message, "List not found");
}

#[tokio::test]
async fn migration_with_nothing_to_do_is_scoped_empty() {
    let remote = ScriptedRemote::new();
    let result = Migrator::new(&config(), &remote).run_migration().await;
    assert_eq!(result.phase, RunPhase::ScopedEmpty);
    assert_eq!(result.updated, 0);
    assert_eq!(result.errors, 0);
}

#[tokio::test]
async fn migration_with_no_lists_reports_error() {
    let remote = ScriptedRemote::new();
    let cfg = AppConfig {
        space_id: "S".into(),
        ..config()
    };
    let result = Migrator::new(&cfg, &remote).run_migration().await;
    assert_eq!(result.phase, RunPhase::ScopedEmpty);
    assert_eq!(result.errors, 1);
}

#[tokio::test]
async fn migration_without_any_scope_is_config_error() {
    let remote = ScriptedRemote::new();
    let cfg = AppConfig {
        workspace_id: String::new(),
        ..config()
    };
    let result = Migrator::new(&cfg, &remote).run_migration().await;
    assert_eq!(result.phase, RunPhase::Error);
    assert!(result.message.contains("No scope specified"));
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn scan_does_not_update() {
    let remote = ScriptedRemote::new()
        .reply(&ws_page("W1", "complete", 0), page(&["a", "b"], "complete"));

    let resp = Migrator::new(&config(), &remote).scan_tasks(None).await;

    assert!(resp.success);
    assert_eq!(resp.tasks.len(), 2);
    assert_eq!(resp.message, "2 task(s) found");
    assert!(!remote.calls().iter().any(|c| c.starts_with("PUT")));
}

#[tokio::test]
async fn scan_reports_failed_list_page() {
    let remote = ScriptedRemote::new()
        .fail(&list_page("A", "complete", 0), 500, "Internal error");
    let cfg = AppConfig {
        list_ids: "A".into(),
        ..config()
    };

    let resp = Migrator::new(&cfg, &remote).scan_tasks(None).await;

    assert!(!resp.success);
    assert_eq!(resp.message, "Internal error");
    assert!(resp.tasks.is_empty());
}

#[tokio::test]
async fn scan_auth_failure_gets_actionable_message() {
    let remote = ScriptedRemote::new()
        .fail(&ws_page("W1", "complete", 0), 401, "Token invalid");
    let resp = Migrator::new(&config(), &remote).scan_tasks(None).await;
    assert!(!resp.success);
    assert_eq!(resp.message, AUTH_FAILED_MESSAGE);
}

#[tokio::test]
async fn scan_all_keeps_parent_ids() {
    let path = TaskQuery::workspace("W1", None).with_subtasks().page_path(0);
    let remote = ScriptedRemote::new().reply(
        &path,
        json!({"tasks": [
            {"id": "p", "name": "Parent", "status": {"status": "open"}},
            {"id": "c", "name": "Child", "parent": "p"}
        ]}),
    );

    let resp = Migrator::new(&config(), &remote).scan_all_tasks(None).await;

    assert!(resp.success);
    assert_eq!(resp.tasks[1].parent.as_deref(), Some("p"));
    assert_eq!(resp.tasks[1].status, "sem status");
}

#[tokio::test]
async fn all_statuses_are_distinct_and_sorted() {
    let path = TaskQuery::workspace("W1", None).with_subtasks().page_path(0);
    let remote = ScriptedRemote::new().reply(
        &path,
        json!({"tasks": [
            task_json("1", "review"),
            task_json("2", "complete"),
            task_json("3", "review"),
            {"id": "4"}
        ]}),
    );

    let resp = Migrator::new(&config(), &remote).all_statuses(None).await;
    assert!(resp.success);
    assert_eq!(resp.statuses, vec!["complete", "review"]);
}

#[tokio::test]
async fn spaces_are_counted_per_source_status() {
    let counted = |space: &str, status: &str| {
        TaskQuery::workspace("W1", Some(status))
            .in_space(space)
            .page_path(0)
    };
    let remote = ScriptedRemote::new()
        .reply(
            "team/W1/space?archived=false",
            json!({"spaces": [
                {"id": "S1", "name": "Ops", "color": "#f00"},
                {"id": "S2", "name": "Dev"}
            ]}),
        )
        .reply(&counted("S1", "complete"), page(&["a", "b"], "complete"))
        .reply(&counted("S1", "done"), page(&["c"], "done"));
    let cfg = AppConfig {
        from_status: "complete,done".into(),
        ..config()
    };

    let resp = Migrator::new(&cfg, &remote).spaces_with_counts(None).await;

    assert!(resp.success);
    assert_eq!(resp.all_spaces.len(), 2);
    assert_eq!(resp.spaces.len(), 1);
    assert_eq!(resp.spaces[0].id, "S1");
    assert_eq!(resp.spaces[0].task_count, 3);
    assert_eq!(resp.all_spaces[1].task_count, 0);
}

#[tokio::test]
async fn members_default_to_configured_workspace() {
    let remote = ScriptedRemote::new().reply(
        "team/W1",
        json!({"team": {"members": [{"user": {"id": 1, "username": "ana"}}]}}),
    );
    let resp = Migrator::new(&config(), &remote)
        .workspace_members(None)
        .await;
    assert!(resp.success);
    assert_eq!(resp.members[0].username, "ana");
    assert_eq!(resp.members[0].color, "#7b68ee");
}

#[tokio::test]
async fn change_status_validates_input() {
    let remote = ScriptedRemote::new();
    let cfg = config();
    let migrator = Migrator::new(&cfg, &remote);

    let resp = migrator.change_status(&[], "done").await;
    assert!(!resp.success);
    assert_eq!(resp.message, "No tasks selected.");

    let resp = migrator.change_status(&ids(&["a"]), "  ").await;
    assert!(!resp.success);
    assert_eq!(resp.message, "Target status not provided.");

    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn change_status_reports_partial_failure() {
    let remote = ScriptedRemote::new().fail("task/b", 404, "Task not found");
    let resp = Migrator::new(&config(), &remote)
        .change_status(&ids(&["a", "b", "c"]), "in progress")
        .await;

    assert!(!resp.success);
    assert_eq!(resp.updated, 2);
    assert_eq!(resp.errors, Some(vec!["b: Task not found".to_string()]));
    assert!(remote.calls()[0].contains(r#""status":"in progress""#));
}

#[tokio::test]
async fn close_uses_configured_target() {
    let remote = ScriptedRemote::new();
    let resp = Migrator::new(&config(), &remote)
        .close_tasks(&ids(&["a"]))
        .await;
    assert!(resp.success);
    assert_eq!(resp.updated, 1);
    assert!(remote.calls()[0].contains(r#""status":"closed""#));
}

#[tokio::test]
async fn space_statuses_flatten_groups() {
    let remote = ScriptedRemote::new().reply(
        "space/S1",
        json!({"statuses": [{"statuses": [{"status": "open"}, {"status": "closed"}]}]}),
    );
    let resp = Migrator::new(&config(), &remote).space_statuses("S1").await;
    assert!(resp.success);
    assert_eq!(resp.statuses, vec!["open", "closed"]);
}
