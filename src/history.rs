//! Query and connection history
//!
//! `QueryHistory` is a ring buffer of executed statements with shell-like
//! back/forward navigation for REPL front-ends. It saves the current input as
//! a "draft" when entering browse mode and restores it when navigating past
//! the newest entry. Persisted to `~/.pgsense/history` using null-byte
//! separators so multi-line SQL survives.
//!
//! `RecentTargets` is the most-recent-first list of database URLs offered
//! when picking a connection, persisted to `~/.pgsense/recent.toml`.
//!
//! Persistence is best-effort: I/O failures are logged and otherwise ignored
//! so history never takes the editor down. Both files can hold credentials
//! or sensitive SQL and are written readable by the owner only.

use crate::config::{ConnectionTarget, config_dir};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Separator between history entries on disk. Null bytes never appear in SQL,
/// so this cleanly handles multi-line queries without escaping.
const ENTRY_SEPARATOR: char = '\0';

pub struct QueryHistory {
    entries: VecDeque<String>,
    capacity: usize,
    /// `None` = not browsing, `Some(i)` = showing `entries[i]`
    position: Option<usize>,
    /// Input line saved on the first step back
    draft: Option<String>,
    /// File path for persistence (`None` = in-memory only)
    path: Option<PathBuf>,
}

impl QueryHistory {
    /// Create an in-memory-only history (no persistence).
    pub fn new(capacity: usize) -> Self {
        Self::load_from(None, capacity)
    }

    /// Load history from `~/.pgsense/history`, creating an empty history
    /// if the file doesn't exist or can't be read.
    pub fn load(capacity: usize) -> Self {
        let path = config_dir().ok().map(|d| d.join("history"));
        Self::load_from(path, capacity)
    }

    fn load_from(path: Option<PathBuf>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries: VecDeque<String> = path
            .as_ref()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .map(|content| {
                content
                    .split(ENTRY_SEPARATOR)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        // Trim to capacity (keep newest)
        while entries.len() > capacity {
            entries.pop_front();
        }

        Self {
            entries,
            capacity,
            position: None,
            draft: None,
            path,
        }
    }

    /// Write all entries to disk. Best-effort: errors are logged and dropped.
    fn save(&self) {
        let Some(path) = &self.path else { return };
        let content: String = self
            .entries
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(&ENTRY_SEPARATOR.to_string());
        write_best_effort(path, &content);
    }

    /// Record an executed statement. Trims whitespace, skips empty,
    /// deduplicates consecutive entries, drops oldest at capacity.
    pub fn push(&mut self, query: &str) {
        let trimmed = query.trim().to_string();
        if trimmed.is_empty() {
            return;
        }
        // Skip consecutive duplicates
        if self.entries.back() == Some(&trimmed) {
            self.reset_position();
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(trimmed);
        self.reset_position();
        self.save();
    }

    /// Oldest first
    pub fn entries(&self) -> Vec<&str> {
        self.entries.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Navigate to an older entry. On first call, saves `current_content` as draft.
    /// Returns `None` when already at the oldest entry.
    pub fn back(&mut self, current_content: &str) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let new_pos = match self.position {
            None => {
                self.draft = Some(current_content.to_string());
                self.entries.len() - 1
            }
            Some(0) => return None, // already at oldest
            Some(p) => p - 1,
        };
        self.position = Some(new_pos);
        Some(&self.entries[new_pos])
    }

    /// Navigate to a newer entry. When moving past the newest,
    /// restores the draft and exits browse mode.
    /// Returns `None` when not browsing.
    pub fn forward(&mut self) -> Option<&str> {
        let pos = self.position?;
        if pos + 1 < self.entries.len() {
            self.position = Some(pos + 1);
            Some(&self.entries[pos + 1])
        } else {
            self.position = None;
            self.draft.as_deref()
        }
    }

    fn reset_position(&mut self) {
        self.position = None;
        self.draft = None;
    }

    pub fn is_browsing(&self) -> bool {
        self.position.is_some()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecentFile {
    #[serde(default)]
    urls: Vec<String>,
}

/// Database URLs in most-recent-first order, without duplicates
#[derive(Debug, Default)]
pub struct RecentTargets {
    urls: Vec<String>,
    /// Optional cap; `None` keeps everything
    limit: Option<usize>,
    path: Option<PathBuf>,
}

impl RecentTargets {
    /// In-memory list (no persistence)
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            urls: Vec::new(),
            limit,
            path: None,
        }
    }

    /// Load from `~/.pgsense/recent.toml`; an unreadable file yields an empty list
    pub fn load(limit: Option<usize>) -> Self {
        let path = config_dir().ok().map(|d| d.join("recent.toml"));
        Self::load_from(path, limit)
    }

    fn load_from(path: Option<PathBuf>, limit: Option<usize>) -> Self {
        let file: RecentFile = path
            .as_ref()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|content| match toml::from_str(&content) {
                Ok(file) => Some(file),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring unreadable recent targets file");
                    None
                }
            })
            .unwrap_or_default();

        let mut recent = Self {
            urls: Vec::new(),
            limit,
            path,
        };
        for url in file.urls {
            if !recent.urls.contains(&url) {
                recent.urls.push(url);
            }
        }
        recent.truncate();
        recent
    }

    /// Move `target` to the front, dropping its earlier occurrence
    pub fn record(&mut self, target: &ConnectionTarget) {
        let url = target.to_url();
        self.urls.retain(|u| *u != url);
        self.urls.insert(0, url);
        self.truncate();
        self.save();
    }

    /// Recent URLs followed by any `extras` not already listed
    pub fn list(&self, extras: &[String]) -> Vec<String> {
        let mut out = self.urls.clone();
        for extra in extras {
            let canonical = ConnectionTarget::from_url(extra)
                .map(|t| t.to_url())
                .unwrap_or_else(|_| extra.trim().to_string());
            if !out.contains(&canonical) {
                out.push(canonical);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    fn truncate(&mut self) {
        if let Some(limit) = self.limit {
            self.urls.truncate(limit);
        }
    }

    fn save(&self) {
        let Some(path) = &self.path else { return };
        let file = RecentFile {
            urls: self.urls.clone(),
        };
        match toml::to_string(&file) {
            Ok(content) => write_best_effort(path, &content),
            Err(e) => tracing::warn!(error = %e, "could not serialize recent targets"),
        }
    }
}

fn write_best_effort(path: &Path, content: &str) {
    if let Some(dir) = path.parent()
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        tracing::debug!(path = %dir.display(), error = %e, "could not create history dir");
        return;
    }
    if let Err(e) = write_private(path, content) {
        tracing::debug!(path = %path.display(), error = %e, "could not write history");
    }
}

fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    #[cfg(unix)]
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path)?;
    // mode only applies when the file is created
    #[cfg(unix)]
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(content.as_bytes())
}
