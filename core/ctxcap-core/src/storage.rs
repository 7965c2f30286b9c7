//! Storage configuration and path management for ctxcap.
//!
//! All path decisions live here so that tests can inject a temp root and
//! production code can stay free of hardcoded paths.
//!
//! ## On-Disk Layout
//!
//! ```text
//! ~/.ctxcap/
//! ├── active.json                      # singleton marker for the running session
//! ├── wal/session-{id}.jsonl           # append-only event log
//! ├── sessions/{id}/audit.json         # immutable start record
//! ├── sessions/{id}/audit.finished.json# renamed on clean shutdown
//! └── logs/ctxcap.log                  # daemon/CLI log file
//! ```

use std::path::{Path, PathBuf};

/// Central configuration for all ctxcap storage paths.
///
/// Production code uses `StorageConfig::default()` which points to
/// `~/.ctxcap/`. Tests use `StorageConfig::with_root(temp_dir)` for
/// isolation.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all ctxcap data (default: ~/.ctxcap)
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = dirs::home_dir().expect("Could not find home directory");
        Self {
            root: home.join(".ctxcap"),
        }
    }
}

impl StorageConfig {
    /// Creates a StorageConfig with a custom root directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    /// Returns the root directory for ctxcap data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the singleton marker for the currently active session.
    pub fn active_marker_file(&self) -> PathBuf {
        self.root.join("active.json")
    }

    /// Path to the wal/ directory (append-only event logs).
    pub fn wal_dir(&self) -> PathBuf {
        self.root.join("wal")
    }

    /// Path to a session's event log.
    /// Example: ~/.ctxcap/wal/session-3f2a….jsonl
    pub fn wal_file(&self, session_id: &str) -> PathBuf {
        self.wal_dir().join(format!("session-{}.jsonl", session_id))
    }

    /// Path to the sessions/ directory (per-session audit records).
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    /// Path to a session's data directory.
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(session_id)
    }

    /// Path to a session's immutable start record.
    pub fn audit_file(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("audit.json")
    }

    /// Path the audit record is renamed to on clean shutdown.
    pub fn finished_audit_file(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("audit.finished.json")
    }

    /// Path to the logs/ directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Ensures the root directory and standard subdirectories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs_err::create_dir_all(&self.root)?;
        fs_err::create_dir_all(self.wal_dir())?;
        fs_err::create_dir_all(self.sessions_dir())?;
        fs_err::create_dir_all(self.logs_dir())?;
        Ok(())
    }

    /// Ensures a session's data directory exists.
    pub fn ensure_session_dir(&self, session_id: &str) -> std::io::Result<()> {
        fs_err::create_dir_all(self.session_dir(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_root_is_ctxcap() {
        let config = StorageConfig::default();
        assert!(config.root().ends_with(".ctxcap"));
    }

    #[test]
    fn test_with_root_sets_custom_path() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/test-ctxcap"));
        assert_eq!(config.root(), Path::new("/tmp/test-ctxcap"));
    }

    #[test]
    fn test_active_marker_path() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/ctxcap"));
        assert_eq!(
            config.active_marker_file(),
            PathBuf::from("/tmp/ctxcap/active.json")
        );
    }

    #[test]
    fn test_wal_file_path() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/ctxcap"));
        assert_eq!(
            config.wal_file("abc-123"),
            PathBuf::from("/tmp/ctxcap/wal/session-abc-123.jsonl")
        );
    }

    #[test]
    fn test_audit_file_paths() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/ctxcap"));
        assert_eq!(
            config.audit_file("abc"),
            PathBuf::from("/tmp/ctxcap/sessions/abc/audit.json")
        );
        assert_eq!(
            config.finished_audit_file("abc"),
            PathBuf::from("/tmp/ctxcap/sessions/abc/audit.finished.json")
        );
    }

    #[test]
    fn test_ensure_dirs_creates_structure() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig::with_root(temp.path().join("data"));

        config.ensure_dirs().unwrap();

        assert!(config.wal_dir().exists());
        assert!(config.sessions_dir().exists());
        assert!(config.logs_dir().exists());
    }

    #[test]
    fn test_ensure_session_dir_creates_directory() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig::with_root(temp.path().to_path_buf());

        config.ensure_session_dir("abc").unwrap();

        assert!(config.session_dir("abc").exists());
    }
}
