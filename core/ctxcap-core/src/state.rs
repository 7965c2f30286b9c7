//! On-disk session state: the active marker and per-session audit records.
//!
//! The marker file is the single source of truth for "what session, if any,
//! is active". Separate `start`/`stop`/`status` processes coordinate only
//! through it, so every write goes through the temp-file-then-rename pattern
//! and no reader ever observes a half-written file.
//!
//! # Defensive Design
//!
//! Readers must tolerate whatever a crashed or concurrent writer left
//! behind:
//! - absent file → no active session, not an error
//! - unparsable JSON or missing fields → treated as absent; the corrupt
//!   file is opportunistically deleted
//! - file disappearing between exists/read → absent
//!
//! Removal is pid-guarded: `clear_active(expected_pid)` only removes the
//! marker if its recorded pid still matches, so a stale reader can never
//! delete a marker belonging to a session that restarted in the meantime.

use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::config::SessionConfig;
use crate::error::{CtxError, Result};
use crate::storage::StorageConfig;

/// Singleton record of the currently (believed) running session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveMarker {
    pub session_id: String,
    pub pid: u32,
    pub wal_path: PathBuf,
    pub config: SessionConfig,
    pub active: bool,
}

/// Immutable audit record written once at session start. Renamed to
/// `audit.finished.json` on clean shutdown, giving a durable historical
/// record independent of the mutable marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    pub session_id: String,
    pub ts_started: String,
    pub pid: u32,
    pub wal_path: PathBuf,
    pub config: SessionConfig,
    pub sampler: String,
}

/// Atomically replaces the active marker.
pub fn write_active(storage: &StorageConfig, marker: &ActiveMarker) -> Result<()> {
    write_atomic(storage.active_marker_file(), marker)
}

/// Reads the active marker, treating absence and corruption as `None`.
///
/// Returns `Err` only when the file exists but cannot be *read* (an I/O
/// failure distinct from corruption, e.g. permissions).
pub fn read_active(storage: &StorageConfig) -> Result<Option<ActiveMarker>> {
    let path = storage.active_marker_file();
    let content = match fs_err::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(CtxError::StateUnreadable {
                path,
                source: err.into(),
            })
        }
    };

    match serde_json::from_str::<ActiveMarker>(&content) {
        Ok(marker) => Ok(Some(marker)),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Corrupt active marker; treating as absent");
            // Opportunistic cleanup; a concurrent delete is fine.
            if let Err(remove_err) = fs_err::remove_file(&path) {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %remove_err, "Failed to remove corrupt marker");
                }
            }
            Ok(None)
        }
    }
}

/// Removes the marker only if its recorded pid matches `expected_pid`.
/// Returns whether the marker was removed.
pub fn clear_active(storage: &StorageConfig, expected_pid: u32) -> Result<bool> {
    let Some(marker) = read_active(storage)? else {
        return Ok(false);
    };
    if marker.pid != expected_pid {
        warn!(
            marker_pid = marker.pid,
            expected_pid, "Active marker owned by another pid; leaving it in place"
        );
        return Ok(false);
    }
    remove_active(storage)?;
    Ok(true)
}

/// Unconditionally removes the marker. Used when a `stop`/`status` caller
/// has already proven the recorded process dead or unrecoverable.
pub fn remove_active(storage: &StorageConfig) -> Result<()> {
    match fs_err::remove_file(storage.active_marker_file()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Writes the immutable audit record for a session.
pub fn write_audit(storage: &StorageConfig, record: &AuditRecord) -> Result<()> {
    storage.ensure_session_dir(&record.session_id)?;
    write_atomic(storage.audit_file(&record.session_id), record)
}

/// Renames `audit.json` to `audit.finished.json`, marking a clean shutdown.
/// Idempotent: an already-finalized or missing audit is not an error.
pub fn finalize_audit(storage: &StorageConfig, session_id: &str) -> Result<()> {
    let from = storage.audit_file(session_id);
    let to = storage.finished_audit_file(session_id);
    match fs_err::rename(&from, &to) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn write_atomic<T: Serialize>(path: PathBuf, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| CtxError::Config(format!("state path has no parent: {}", path.display())))?;
    fs_err::create_dir_all(parent)?;

    let content = serde_json::to_string_pretty(value)?;
    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.flush()?;
    temp_file.persist(&path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn marker(pid: u32) -> ActiveMarker {
        ActiveMarker {
            session_id: "abc-123".to_string(),
            pid,
            wal_path: PathBuf::from("/tmp/wal/session-abc-123.jsonl"),
            config: SessionConfig::default(),
            active: true,
        }
    }

    #[test]
    fn test_read_absent_marker_is_none() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        assert!(read_active(&storage).unwrap().is_none());
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());

        write_active(&storage, &marker(4242)).unwrap();

        let read = read_active(&storage).unwrap().unwrap();
        assert_eq!(read, marker(4242));
    }

    #[test]
    fn test_corrupt_marker_treated_as_absent_and_deleted() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        fs_err::create_dir_all(storage.root()).unwrap();
        fs_err::write(storage.active_marker_file(), "{not json").unwrap();

        assert!(read_active(&storage).unwrap().is_none());
        assert!(!storage.active_marker_file().exists());
    }

    #[test]
    fn test_marker_missing_fields_treated_as_absent() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        fs_err::create_dir_all(storage.root()).unwrap();
        fs_err::write(storage.active_marker_file(), r#"{"session_id": "x"}"#).unwrap();

        assert!(read_active(&storage).unwrap().is_none());
        assert!(!storage.active_marker_file().exists());
    }

    #[test]
    fn test_clear_active_requires_matching_pid() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        write_active(&storage, &marker(4242)).unwrap();

        assert!(!clear_active(&storage, 9999).unwrap());
        assert!(storage.active_marker_file().exists());

        assert!(clear_active(&storage, 4242).unwrap());
        assert!(!storage.active_marker_file().exists());
    }

    #[test]
    fn test_clear_active_on_absent_marker_is_noop() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        assert!(!clear_active(&storage, 4242).unwrap());
    }

    #[test]
    fn test_finalize_audit_renames_record() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let record = AuditRecord {
            session_id: "abc".to_string(),
            ts_started: "2026-08-30T00:00:00.000000Z".to_string(),
            pid: 4242,
            wal_path: PathBuf::from("/tmp/wal.jsonl"),
            config: SessionConfig::default(),
            sampler: "null".to_string(),
        };

        write_audit(&storage, &record).unwrap();
        assert!(storage.audit_file("abc").exists());

        finalize_audit(&storage, "abc").unwrap();
        assert!(!storage.audit_file("abc").exists());
        assert!(storage.finished_audit_file("abc").exists());

        let content = fs_err::read_to_string(storage.finished_audit_file("abc")).unwrap();
        let back: AuditRecord = serde_json::from_str(&content).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_finalize_audit_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        finalize_audit(&storage, "never-started").unwrap();
    }
}
