//! Error types for ctxcap-core operations.
//!
//! The variants map onto how each failure is handled: corruption reads as
//! absence, a dead pid reads as staleness, an unverifiable live pid is a
//! refusal. Callers decide exit codes; this crate only classifies.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, CtxError>;

/// All errors that can occur in ctxcap-core operations.
#[derive(Debug, thiserror::Error)]
pub enum CtxError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors (rejected before a session starts)
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────────────
    // Persisted State Errors
    // ─────────────────────────────────────────────────────────────────────
    /// A state file could not be read at all (not merely parsed; corrupt
    /// but readable JSON is classified as absence, never as an error).
    #[error("Unreadable state file: {path}: {source}")]
    StateUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Process Errors
    // ─────────────────────────────────────────────────────────────────────
    /// The recorded pid is not alive. Treated as a stale session.
    #[error("Process {pid} not found")]
    ProcessLookup { pid: u32 },

    /// Signal delivery blocked by an OS privilege boundary.
    #[error("Permission denied signaling process {pid}")]
    PermissionDenied { pid: u32 },

    // ─────────────────────────────────────────────────────────────────────
    // External Boundaries
    // ─────────────────────────────────────────────────────────────────────
    #[error("Sampler error: {0}")]
    Sampler(String),

    // ─────────────────────────────────────────────────────────────────────
    // Plumbing
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
