//! # ctxcap-core
//!
//! Core library for ctxcap, a local context-capture session daemon: it
//! samples desktop state (active app, window title, clipboard) at a
//! configurable cadence, appends each observation to a durable per-session
//! log, and optionally derives a lightweight text embedding from changed
//! content.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. The run loop is a
//!   single-threaded cooperative loop.
//! - **File-coordinated**: `start`, `stop` and `status` run as independent
//!   short-lived processes; the only shared state between them is the
//!   atomically-replaced marker file, the audit record and OS signals.
//! - **Graceful degradation**: Absent or corrupt persisted state reads as
//!   absence, never as a crash.
//! - **Pluggable boundaries**: The native sampler and the embedding model
//!   sit behind traits so tests can inject deterministic stubs.

// Public modules
pub mod config;
pub mod embed;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod process;
pub mod sampler;
pub mod state;
pub mod storage;
pub mod trigger;
pub mod wal;

// Re-export commonly used items at crate root
pub use config::SessionConfig;
pub use embed::{Embedder, Embedding, HashEmbedder};
pub use error::{CtxError, Result};
pub use events::{EmbedEvent, StateEvent};
pub use lifecycle::{SessionHandle, SessionStatus, StopOutcome};
pub use sampler::{NullSampler, RawState, Sampler, SyntheticSampler};
pub use state::{ActiveMarker, AuditRecord};
pub use storage::StorageConfig;
