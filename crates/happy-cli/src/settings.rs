// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `settings.json` under the Happy home directory: onboarding/machine
//! identity. Reads tolerate a missing or malformed file by returning
//! defaults; writes are atomic (write `*.tmp`, rename in place) and
//! multi-process-safe via an exclusive-create lockfile.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);
const LOCK_RETRY_BUDGET: Duration = Duration::from_secs(5);
const LOCK_STALE_THRESHOLD: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub onboarding_completed: bool,
    pub machine_id: Uuid,
    #[serde(default)]
    pub machine_id_confirmed_by_server: bool,
    #[serde(default)]
    pub profile: Option<serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            onboarding_completed: false,
            machine_id: Uuid::new_v4(),
            machine_id_confirmed_by_server: false,
            profile: None,
        }
    }
}

impl Settings {
    /// Load `settings.json` under `home`, returning defaults for a missing
    /// or malformed file.
    pub fn load(home: &Path) -> Self {
        let path = settings_path(home);
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        serde_json::from_str(&contents).unwrap_or_default()
    }

    /// Persist this value atomically, guarded by the lockfile.
    pub fn save(&self, home: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(home)?;
        let path = settings_path(home);
        let lock_path = lock_path(home);
        let _lock = FileLock::acquire(&lock_path)?;

        let tmp_path = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp_path, body)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

fn settings_path(home: &Path) -> PathBuf {
    home.join("settings.json")
}

fn lock_path(home: &Path) -> PathBuf {
    home.join("settings.json.lock")
}

/// Exclusive-create lockfile with stale-lock detection. Held for the
/// lifetime of the guard; released (best-effort) on drop.
struct FileLock {
    path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let deadline = std::time::Instant::now() + LOCK_RETRY_BUDGET;
        let mut tried_stale_removal = false;

        loop {
            match std::fs::OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => return Ok(Self { path: path.to_path_buf() }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if !tried_stale_removal && is_stale(path) {
                        tried_stale_removal = true;
                        let _ = std::fs::remove_file(path);
                        continue;
                    }
                    if std::time::Instant::now() >= deadline {
                        anyhow::bail!("timed out waiting for lock at {}", path.display());
                    }
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn is_stale(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else { return false };
    let Ok(modified) = metadata.modified() else { return false };
    SystemTime::now().duration_since(modified).map(|age| age > LOCK_STALE_THRESHOLD).unwrap_or(false)
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
