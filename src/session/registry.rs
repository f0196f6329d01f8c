//! # Session Registry
//!
//! Maps opaque session identifiers to their last-access time and owns the naming
//! convention that scopes every temporary file to a session:
//!
//! ```text
//! <storage_dir>/<session_id>_<artifact_name>
//! ```
//!
//! ## Session Lifecycle:
//! 1. **Created**: `create()` records the session with the current time
//! 2. **Active**: every `resolve_path()` refreshes the last-access time
//! 3. **Evicted**: removed explicitly via `evict()` or by a sweep once idle past `max_age`
//!
//! ## Thread Safety:
//! The id → timestamp table sits behind a `Mutex`. Every read and write takes the lock,
//! including the sweep's scan, so no caller ever sees a half-updated table. Filesystem
//! work (deleting artifacts, scanning the directory) always happens after the lock is
//! released so request handlers are never blocked behind a slow directory scan.

use crate::error::{AudioError, AudioResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Opaque session identifier.
///
/// Always generated from a random v4 UUID (122 bits of entropy), never taken verbatim
/// from user input. Parsing a client-supplied id goes through `Uuid::parse_str`, so an
/// id can never contain a path separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client-supplied identifier.
    pub fn parse(raw: &str) -> AudioResult<Self> {
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| AudioError::InvalidSession(raw.to_string()))
    }

    /// Prefix shared by every artifact of this session (`"<id>_"`).
    pub fn file_prefix(&self) -> String {
        format!("{}_", self)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for SessionId {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// What one sweep cycle removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions evicted because they were idle past `max_age`
    pub expired_sessions: usize,
    /// Files deleted, whether they belonged to an expired session or were orphaned
    pub files_removed: usize,
}

/// Registry of live sessions and the single sanctioned way to build artifact paths.
///
/// ## Usage:
/// ```rust
/// let registry = SessionRegistry::new("temp", Duration::from_secs(1800))?;
/// let id = registry.create();
/// let path = registry.resolve_path(&id, "downloaded_audio.wav");
/// ```
pub struct SessionRegistry {
    /// Flat directory holding every session's artifacts
    storage_dir: PathBuf,

    /// Idle threshold for sessions and files, adjustable at runtime
    max_age: RwLock<Duration>,

    /// Session id → last access time
    sessions: Mutex<HashMap<SessionId, DateTime<Utc>>>,
}

impl SessionRegistry {
    /// Create a registry rooted at `storage_dir`, creating the directory if needed.
    pub fn new(storage_dir: impl Into<PathBuf>, max_age: Duration) -> AudioResult<Self> {
        let storage_dir = storage_dir.into();
        fs::create_dir_all(&storage_dir)?;

        Ok(Self {
            storage_dir,
            max_age: RwLock::new(max_age),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Directory shared by all session artifacts.
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Idle threshold applied by `sweep`.
    pub fn max_age(&self) -> Duration {
        *self.max_age.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the idle threshold used by subsequent sweeps.
    pub fn set_max_age(&self, max_age: Duration) {
        *self.max_age.write().unwrap_or_else(PoisonError::into_inner) = max_age;
    }

    /// Lock the session table.
    ///
    /// A panic while holding the lock cannot leave the map half-written (every critical
    /// section is a single insert/remove/lookup), so a poisoned lock is safe to recover.
    fn table(&self) -> MutexGuard<'_, HashMap<SessionId, DateTime<Utc>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new session and return its identifier.
    pub fn create(&self) -> SessionId {
        let id = SessionId::generate();
        self.table().insert(id, Utc::now());
        debug!(session_id = %id, "Session created");
        id
    }

    /// Refresh the last-access time of a known session. Unknown ids are ignored.
    pub fn touch(&self, id: &SessionId) {
        if let Some(last_access) = self.table().get_mut(id) {
            *last_access = Utc::now();
        }
    }

    /// Whether the session is currently registered.
    pub fn exists(&self, id: &SessionId) -> bool {
        self.table().contains_key(id)
    }

    /// Like `exists`, but as a typed error for operations that require a live session.
    pub fn require(&self, id: &SessionId) -> AudioResult<()> {
        if self.exists(id) {
            Ok(())
        } else {
            Err(AudioError::InvalidSession(id.to_string()))
        }
    }

    /// Last access time of a session, if registered.
    pub fn last_access(&self, id: &SessionId) -> Option<DateTime<Utc>> {
        self.table().get(id).copied()
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.table().len()
    }

    /// Build the path of a session artifact, recording activity on the session.
    ///
    /// This is the only place artifact paths are constructed. `artifact_name` comes from
    /// the pipeline's fixed vocabulary (or a validated file name at the HTTP layer).
    pub fn resolve_path(&self, id: &SessionId, artifact_name: &str) -> PathBuf {
        self.touch(id);
        self.storage_dir.join(format!("{}{}", id.file_prefix(), artifact_name))
    }

    /// Remove every artifact of a session and then the session itself.
    ///
    /// Idempotent: evicting an unknown or already-evicted id just sweeps any stray files
    /// with its prefix. Returns the number of files deleted.
    pub fn evict(&self, id: &SessionId) -> usize {
        let removed = self.remove_session_files(id);
        self.table().remove(id);
        debug!(session_id = %id, files_removed = removed, "Session evicted");
        removed
    }

    /// Run one sweep cycle against the current time.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now())
    }

    /// Run one sweep cycle as if the current time were `now`.
    ///
    /// ## Steps:
    /// 1. Under the lock, drop every session idle for longer than `max_age`
    /// 2. Outside the lock, delete those sessions' artifacts
    /// 3. Delete any file in the storage directory whose modification time is older
    ///    than `max_age`, whether or not a live session owns it (covers files left
    ///    behind by a restart)
    ///
    /// Deletion failures are logged and skipped; the sweep is hygiene, not correctness.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let max_age = chrono_duration(self.max_age());

        let expired: Vec<SessionId> = {
            let mut table = self.table();
            let expired: Vec<SessionId> = table
                .iter()
                .filter(|(_, last_access)| now.signed_duration_since(**last_access) > max_age)
                .map(|(id, _)| *id)
                .collect();
            for id in &expired {
                table.remove(id);
            }
            expired
        };

        let mut report = SweepReport {
            expired_sessions: expired.len(),
            files_removed: 0,
        };

        for id in &expired {
            report.files_removed += self.remove_session_files(id);
        }

        let cutoff: SystemTime = (now - max_age).into();
        report.files_removed += self.remove_files_older_than(cutoff);

        if report.expired_sessions > 0 || report.files_removed > 0 {
            info!(
                expired_sessions = report.expired_sessions,
                files_removed = report.files_removed,
                remaining_sessions = self.session_count(),
                "Session sweep completed"
            );
        } else {
            debug!("Session sweep found nothing to remove");
        }

        report
    }

    /// Delete every file carrying the session's prefix.
    fn remove_session_files(&self, id: &SessionId) -> usize {
        let prefix = id.file_prefix();
        self.remove_matching(|name, _| name.starts_with(&prefix))
    }

    /// Delete every file last modified before `cutoff`.
    fn remove_files_older_than(&self, cutoff: SystemTime) -> usize {
        self.remove_matching(|_, entry| {
            entry
                .metadata()
                .and_then(|meta| meta.modified())
                .map(|modified| modified < cutoff)
                .unwrap_or(false)
        })
    }

    /// Best-effort deletion of the regular files in the storage directory that match.
    fn remove_matching<F>(&self, should_remove: F) -> usize
    where
        F: Fn(&str, &fs::DirEntry) -> bool,
    {
        let entries = match fs::read_dir(&self.storage_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.storage_dir.display(), error = %e, "Cannot scan storage directory");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }

            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !should_remove(&name, &entry) {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                // Someone else (an explicit evict, a concurrent sweep) got there first
                Err(e) => debug!(file = %name, error = %e, "Skipping artifact that could not be removed"),
            }
        }

        removed
    }
}

/// Convert the configured idle threshold into a chrono duration, saturating on overflow.
fn chrono_duration(duration: Duration) -> chrono::Duration {
    let millis = i64::try_from(duration.as_millis())
        .unwrap_or(i64::MAX)
        .min(i64::MAX / 1_000_000);
    chrono::Duration::milliseconds(millis)
}
