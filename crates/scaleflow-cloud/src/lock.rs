//! Per-topology run lock
//!
//! Keeps two processes from reconciling the same topology at once. The lock
//! is a JSON file under `<state_dir>/locks/`; a lock older than one hour, or
//! one that cannot be read, is considered abandoned and taken over.

use crate::error::LockError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const LOCK_DIR: &str = "locks";
const STALE_AFTER_HOURS: i64 = 1;

/// Lock information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub topology: String,
    pub holder: String,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn is_stale(&self) -> bool {
        Utc::now()
            .signed_duration_since(self.acquired_at)
            .num_hours()
            >= STALE_AFTER_HOURS
    }
}

/// RAII guard for a topology lock
#[derive(Debug)]
pub struct RunLock {
    lock_path: PathBuf,
    released: bool,
}

impl RunLock {
    fn path_for(state_dir: &Path, topology: &str) -> PathBuf {
        let file: String = topology
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        state_dir.join(LOCK_DIR).join(format!("{}.lock", file))
    }

    /// Acquire the lock for `topology`, failing if a live holder exists
    pub async fn acquire(state_dir: &Path, topology: &str) -> Result<Self, LockError> {
        let lock_path = Self::path_for(state_dir, topology);
        if let Some(dir) = lock_path.parent() {
            fs::create_dir_all(dir).await?;
        }

        match Self::holder_at(&lock_path).await {
            Ok(Some(current)) => {
                if !current.is_stale() {
                    return Err(LockError::Held {
                        topology: topology.to_string(),
                        holder: current.holder,
                        pid: current.pid,
                        since: current.acquired_at,
                    });
                }
                tracing::warn!(
                    topology,
                    holder = %current.holder,
                    "Removing stale run lock"
                );
                Self::remove(&lock_path).await?;
            }
            Ok(None) => {}
            Err(LockError::Json(e)) => {
                tracing::warn!(topology, "Removing unreadable run lock: {}", e);
                Self::remove(&lock_path).await?;
            }
            Err(e) => return Err(e),
        }

        let info = LockInfo {
            topology: topology.to_string(),
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };

        // the lock appears fully written; hard_link fails if another acquirer won
        let temp_path = lock_path.with_extension(format!("{}.tmp", info.pid));
        fs::write(&temp_path, serde_json::to_string_pretty(&info)?).await?;
        let linked = fs::hard_link(&temp_path, &lock_path).await;
        let _ = fs::remove_file(&temp_path).await;
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let current = Self::holder_at(&lock_path).await.ok().flatten();
                return Err(LockError::Held {
                    topology: topology.to_string(),
                    holder: current
                        .as_ref()
                        .map(|c| c.holder.clone())
                        .unwrap_or_else(|| "unknown".to_string()),
                    pid: current.as_ref().map(|c| c.pid).unwrap_or(0),
                    since: current.map(|c| c.acquired_at).unwrap_or_else(Utc::now),
                });
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(topology, path = %lock_path.display(), "Acquired run lock");
        Ok(Self {
            lock_path,
            released: false,
        })
    }

    /// Current holder of the lock for `topology`, if any
    pub async fn holder(state_dir: &Path, topology: &str) -> Result<Option<LockInfo>, LockError> {
        Self::holder_at(&Self::path_for(state_dir, topology)).await
    }

    async fn holder_at(lock_path: &Path) -> Result<Option<LockInfo>, LockError> {
        match fs::read_to_string(lock_path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(lock_path: &Path) -> Result<(), LockError> {
        match fs::remove_file(lock_path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Release the lock
    pub async fn release(mut self) -> Result<(), LockError> {
        if !self.released {
            match fs::remove_file(&self.lock_path).await {
                Ok(()) => tracing::debug!("Released run lock"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
