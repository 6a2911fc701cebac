//! Local history of generated prompts.
//!
//! Stored as a JSONL file, one [`HistoryItem`] per line, oldest first on
//! disk. Listing returns newest first. Lines that fail to parse are skipped
//! so a damaged file never blocks new entries.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// One generated prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: String,
    pub idea: String,
    pub prompt: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
    /// Held across every read-modify-write of the file.
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries: max_entries.max(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a new item, dropping the oldest entries beyond the limit.
    pub fn record(
        &self,
        idea: &str,
        prompt: &str,
        model: Option<&str>,
    ) -> anyhow::Result<HistoryItem> {
        let item = HistoryItem {
            id: uuid::Uuid::new_v4().to_string(),
            idea: idea.trim().to_string(),
            prompt: prompt.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            model: model.map(|m| m.to_string()),
        };

        let _guard = self.lock();
        let mut items = self.load();
        items.push(item.clone());
        if items.len() > self.max_entries {
            let excess = items.len() - self.max_entries;
            items.drain(..excess);
            self.write_all(&items)?;
        } else {
            self.append(&item)?;
        }

        debug!(id = %item.id, total = items.len(), "Recorded history item");
        Ok(item)
    }

    /// All items, newest first.
    pub fn list(&self) -> Vec<HistoryItem> {
        let mut items = self.load();
        items.reverse();
        items
    }

    pub fn get(&self, id: &str) -> Option<HistoryItem> {
        self.load().into_iter().find(|i| i.id == id)
    }

    /// Delete one item. Returns `false` if it did not exist.
    pub fn remove(&self, id: &str) -> anyhow::Result<bool> {
        let _guard = self.lock();
        let mut items = self.load();
        let before = items.len();
        items.retain(|i| i.id != id);
        if items.len() == before {
            return Ok(false);
        }
        self.write_all(&items)?;
        Ok(true)
    }

    /// Delete everything. Returns the number of items removed.
    pub fn clear(&self) -> anyhow::Result<usize> {
        let _guard = self.lock();
        let count = self.load().len();
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(count)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is `()`, so a poisoned lock carries no broken state.
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load(&self) -> Vec<HistoryItem> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(n, line)| match serde_json::from_str::<HistoryItem>(line) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(line = n + 1, error = %e, "Skipping unreadable history line");
                    None
                }
            })
            .collect()
    }

    fn ensure_parent(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        Ok(())
    }

    fn append(&self, item: &HistoryItem) -> anyhow::Result<()> {
        self.ensure_parent()?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        writeln!(file, "{}", serde_json::to_string(item)?)?;
        Ok(())
    }

    fn write_all(&self, items: &[HistoryItem]) -> anyhow::Result<()> {
        self.ensure_parent()?;
        let mut out = String::new();
        for item in items {
            out.push_str(&serde_json::to_string(item)?);
            out.push('\n');
        }
        std::fs::write(&self.path, out)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}
