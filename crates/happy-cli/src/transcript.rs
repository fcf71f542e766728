// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovers and tails the newline-delimited-JSON transcript file the child
//! writes for the current conversation. Two phases: discovery (watch the
//! project's transcript directory for the first `<id>.jsonl` to appear) and
//! tailing (follow that single file, byte-offset cursor, truncation-aware).

use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Subpath (under the user's home directory) where the child writes its
/// per-project transcript directories.
pub const TRANSCRIPT_SUBPATH: &str = ".claude/projects";

/// A single parsed transcript record.
#[derive(Debug, Clone)]
pub struct TranscriptRecord {
    pub value: serde_json::Value,
}

/// Compute the project slug: the absolute project path with `/` replaced by `-`.
pub fn project_slug(project_dir: &Path) -> String {
    project_dir.to_string_lossy().replace('/', "-")
}

/// Resolve the well-known transcript directory for a project.
pub fn transcripts_dir(home: &Path, project_dir: &Path) -> PathBuf {
    home.join(TRANSCRIPT_SUBPATH).join(project_slug(project_dir))
}

/// Async generator over transcript lines. One instance corresponds to one
/// local-mode turn; the cursor always starts at offset 0 for a fresh
/// instance, per the concurrency model's "new watcher starts with offset 0".
pub struct TranscriptWatcher {
    dir: PathBuf,
    session_id: Option<String>,
    offset: u64,
    poll_interval: Duration,
}

impl TranscriptWatcher {
    /// A watcher that must first discover which transcript file is ours.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, session_id: None, offset: 0, poll_interval: Duration::from_millis(300) }
    }

    /// A watcher that already knows the transcript session id (resume case)
    /// and can skip discovery straight to tailing.
    pub fn with_known_session(dir: PathBuf, session_id: String) -> Self {
        Self { dir, session_id: Some(session_id), offset: 0, poll_interval: Duration::from_millis(300) }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The transcript session id once discovered (or immediately, if known).
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Run discovery (if needed) then tail until `cancel` fires. Records are
    /// sent in order over `tx`; parse errors are logged and the offending
    /// line is treated as consumed.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<TranscriptRecord>,
        cancel: CancellationToken,
    ) -> anyhow::Result<Option<String>> {
        if self.session_id.is_none() {
            self.session_id = self.discover(&cancel).await?;
        }

        let Some(id) = self.session_id.clone() else {
            return Ok(None);
        };

        let path = self.dir.join(format!("{id}.jsonl"));
        self.tail(&path, tx, cancel).await?;
        Ok(Some(id))
    }

    async fn discover(&self, cancel: &CancellationToken) -> anyhow::Result<Option<String>> {
        let (wake_tx, mut wake_rx) = mpsc::channel(16);
        let _watcher = setup_notify_watcher(&self.dir, wake_tx);
        let mut poll = tokio::time::interval(self.poll_interval);

        loop {
            if let Some(id) = self.scan_for_first_jsonl()? {
                return Ok(Some(id));
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = poll.tick() => continue,
                _ = wake_rx.recv() => continue,
            }
        }
    }

    fn scan_for_first_jsonl(&self) -> anyhow::Result<Option<String>> {
        if !self.dir.is_dir() {
            return Ok(None);
        }

        let mut best: Option<(String, std::time::SystemTime)> = None;
        for entry in std::fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let created = entry.metadata().and_then(|m| m.created().or_else(|_| m.modified()));
            let Ok(created) = created else { continue };
            if best.as_ref().is_none_or(|(_, prev)| created < *prev) {
                best = Some((stem.to_string(), created));
            }
        }

        Ok(best.map(|(id, _)| id))
    }

    async fn tail(
        &mut self,
        path: &Path,
        tx: mpsc::Sender<TranscriptRecord>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let (wake_tx, mut wake_rx) = mpsc::channel(16);
        let _watcher = setup_notify_watcher_for_file(path, wake_tx);
        let mut poll = tokio::time::interval(self.poll_interval);

        loop {
            for record in self.read_new_lines(path)? {
                if tx.send(record).await.is_err() {
                    return Ok(());
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = poll.tick() => continue,
                _ = wake_rx.recv() => continue,
            }
        }
    }

    fn read_new_lines(&mut self, path: &Path) -> anyhow::Result<Vec<TranscriptRecord>> {
        let Ok(file) = std::fs::File::open(path) else {
            // Not an error: the file may not exist yet on the very first tick.
            return Ok(Vec::new());
        };

        let len = file.metadata()?.len();
        if len < self.offset {
            debug!(path = %path.display(), "transcript truncated, resetting cursor");
            self.offset = 0;
        }

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(self.offset))?;

        let mut out = Vec::new();
        loop {
            let mut line = String::new();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            self.offset += read as u64;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<serde_json::Value>(trimmed) {
                Ok(value) => out.push(TranscriptRecord { value }),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unparseable transcript line"),
            }
        }

        Ok(out)
    }
}

fn setup_notify_watcher(
    dir: &Path,
    wake_tx: mpsc::Sender<()>,
) -> Option<notify::RecommendedWatcher> {
    use notify::Watcher;

    let mut watcher = notify::recommended_watcher(move |_event| {
        let _ = wake_tx.try_send(());
    })
    .ok()?;

    watcher.watch(dir, notify::RecursiveMode::NonRecursive).ok();
    Some(watcher)
}

fn setup_notify_watcher_for_file(
    path: &Path,
    wake_tx: mpsc::Sender<()>,
) -> Option<notify::RecommendedWatcher> {
    let parent = path.parent()?;
    setup_notify_watcher(parent, wake_tx)
}

#[cfg(test)]
#[path = "transcript_tests.rs"]
mod tests;
