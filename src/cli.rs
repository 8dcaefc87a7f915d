use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::clickup::HttpRemote;
use crate::config;
use crate::history;
use crate::migrate::Migrator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Migrate,
    Scan { assignee: Option<String> },
    ScanAll { assignee: Option<String> },
    User,
    Teams,
    Members { workspace_id: Option<String> },
    Statuses { workspace_id: Option<String> },
    Spaces { workspace_id: Option<String> },
    SpaceStatuses { space_id: String },
    SetStatus { status: String, task_ids: Vec<String> },
    Close { task_ids: Vec<String> },
    History { limit: Option<usize> },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub config_path: Option<PathBuf>,
    pub command: Command,
}

fn take_value(args: &[String], i: usize, flag: &str) -> Result<String> {
    match args.get(i) {
        Some(v) if !v.starts_with("--") => Ok(v.clone()),
        _ => bail!("Missing value for {flag}"),
    }
}

/// Parse everything after the program name.
///
///   taskmove [--config PATH] <command> [args]
pub fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut config_path = None;
    let mut assignee = None;
    let mut limit = None;
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                config_path = Some(PathBuf::from(take_value(args, i, "--config")?));
            }
            "--assignee" | "-a" => {
                i += 1;
                assignee = Some(take_value(args, i, "--assignee")?);
            }
            "--limit" | "-n" => {
                i += 1;
                let raw = take_value(args, i, "--limit")?;
                limit = Some(
                    raw.parse::<usize>()
                        .with_context(|| format!("--limit must be a number, got {raw:?}"))?,
                );
            }
            "-h" | "--help" => positional.insert(0, "help".to_string()),
            _ => positional.push(args[i].clone()),
        }
        i += 1;
    }

    let Some((name, rest)) = positional.split_first() else {
        return Ok(Invocation {
            config_path,
            command: Command::Help,
        });
    };
    let first = rest.first().cloned();

    let command = match name.as_str() {
        "migrate" => Command::Migrate,
        "scan" => Command::Scan { assignee },
        "scan-all" => Command::ScanAll { assignee },
        "user" => Command::User,
        "teams" => Command::Teams,
        "members" => Command::Members { workspace_id: first },
        "statuses" => Command::Statuses { workspace_id: first },
        "spaces" => Command::Spaces { workspace_id: first },
        "space-statuses" => match first {
            Some(space_id) => Command::SpaceStatuses { space_id },
            None => bail!("Usage: taskmove space-statuses <space-id>"),
        },
        "set-status" => {
            let Some((status, ids)) = rest.split_first() else {
                bail!("Usage: taskmove set-status <status> <task-id>...");
            };
            if ids.is_empty() {
                bail!("No task ids given");
            }
            Command::SetStatus {
                status: status.clone(),
                task_ids: ids.to_vec(),
            }
        }
        "close" => {
            if rest.is_empty() {
                bail!("Usage: taskmove close <task-id>...");
            }
            Command::Close {
                task_ids: rest.to_vec(),
            }
        }
        "history" => Command::History { limit },
        "help" => Command::Help,
        other => bail!("Unknown command: {other}. Run `taskmove help` for usage."),
    };

    Ok(Invocation {
        config_path,
        command,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn record(operation: &str, target: Option<&str>, updated: usize, errors: usize, message: &str) {
    let entry = history::new_entry(operation, target, updated, errors, message);
    if let Err(e) = history::append_entry(&history::history_path(), &entry) {
        tracing::warn!(error = %e, "could not write run history");
    }
}

pub async fn run(invocation: Invocation) -> Result<()> {
    match &invocation.command {
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::History { limit } => {
            let limit = Some(limit.unwrap_or(20));
            let entries = history::read_entries(&history::history_path(), limit);
            return print_json(&entries);
        }
        _ => {}
    }

    let path = invocation
        .config_path
        .clone()
        .unwrap_or_else(config::config_path);
    let config = config::load_config(&path)?;
    tracing::debug!(path = %path.display(), "configuration loaded");

    let remote = HttpRemote::new(&config.token().unwrap_or_default(), &config.limits)?;
    let migrator = Migrator::new(&config, &remote);

    match invocation.command {
        Command::Migrate => {
            let result = migrator.run_migration().await;
            record(
                "migrate",
                config.target_status().as_deref(),
                result.updated,
                result.errors,
                &result.message,
            );
            print_json(&result)
        }
        Command::Scan { assignee } => print_json(&migrator.scan_tasks(assignee.as_deref()).await),
        Command::ScanAll { assignee } => {
            print_json(&migrator.scan_all_tasks(assignee.as_deref()).await)
        }
        Command::User => print_json(&migrator.current_user().await),
        Command::Teams => print_json(&migrator.workspaces().await),
        Command::Members { workspace_id } => {
            print_json(&migrator.workspace_members(workspace_id.as_deref()).await)
        }
        Command::Statuses { workspace_id } => {
            print_json(&migrator.all_statuses(workspace_id.as_deref()).await)
        }
        Command::Spaces { workspace_id } => {
            print_json(&migrator.spaces_with_counts(workspace_id.as_deref()).await)
        }
        Command::SpaceStatuses { space_id } => {
            print_json(&migrator.space_statuses(&space_id).await)
        }
        Command::SetStatus { status, task_ids } => {
            let resp = migrator.change_status(&task_ids, &status).await;
            let failed = resp.errors.as_ref().map_or(0, Vec::len);
            record("set-status", Some(status.as_str()), resp.updated, failed, &resp.message);
            print_json(&resp)
        }
        Command::Close { task_ids } => {
            let resp = migrator.close_tasks(&task_ids).await;
            let failed = resp.errors.as_ref().map_or(0, Vec::len);
            record(
                "close",
                config.target_status().as_deref(),
                resp.updated,
                failed,
                &resp.message,
            );
            print_json(&resp)
        }
        Command::Help | Command::History { .. } => Ok(()),
    }
}

pub fn print_help() {
    println!("taskmove — bulk status changes for ClickUp tasks\n");
    println!("USAGE:");
    println!("  taskmove [--config PATH] <command>\n");
    println!("COMMANDS:");
    println!("  migrate                      Move every task in the source status(es) to the target status");
    println!("  scan [--assignee ID]         List tasks in the source status(es) without changing them");
    println!("  scan-all [--assignee ID]     List every task in the workspace");
    println!("  set-status <STATUS> <ID>...  Move the given tasks to STATUS");
    println!("  close <ID>...                Move the given tasks to the configured target status");
    println!("  user                         Show the authorized user");
    println!("  teams                        List workspaces the token can access");
    println!("  members [WORKSPACE]          List workspace members");
    println!("  statuses [WORKSPACE]         List statuses seen on workspace tasks");
    println!("  spaces [WORKSPACE]           Count source-status tasks per space");
    println!("  space-statuses <SPACE>       List statuses defined on a space");
    println!("  history [--limit N]          Show recent bulk operations");
    println!();
    println!("CONFIG: {}", config::config_path().display());
}
