use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::data_dir;

/// One finished bulk operation. Written for the user's benefit only; runs
/// never read it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_status: Option<String>,
    pub updated: usize,
    pub errors: usize,
    pub message: String,
}

pub fn history_path() -> PathBuf {
    data_dir().join("history.jsonl")
}

pub fn new_entry(
    operation: &str,
    target_status: Option<&str>,
    updated: usize,
    errors: usize,
    message: &str,
) -> HistoryEntry {
    HistoryEntry {
        timestamp: chrono::Utc::now().to_rfc3339(),
        operation: operation.to_string(),
        target_status: target_status.map(String::from),
        updated,
        errors,
        message: message.to_string(),
    }
}

pub fn append_entry(path: &Path, entry: &HistoryEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let line = serde_json::to_string(entry)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Most recent entries last. Unreadable lines are skipped.
pub fn read_entries(path: &Path, limit: Option<usize>) -> Vec<HistoryEntry> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    let mut entries: Vec<HistoryEntry> = contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    if let Some(limit) = limit {
        let len = entries.len();
        if len > limit {
            entries = entries.split_off(len - limit);
        }
    }

    entries
}
