//! Event records appended to the per-session log.
//!
//! Field names are a wire contract with downstream consumers; they must not
//! change. Two record kinds share the log file and are distinguished by
//! their `source` tag:
//!
//! - `os.context.state` — one normalized sampler observation
//! - `os.context.text.embed` — a derived embedding for changed content

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Source tag for normalized sampler observations.
pub const STATE_SOURCE: &str = "os.context.state";

/// Source tag for derived embedding records.
pub const EMBED_SOURCE: &str = "os.context.text.embed";

/// Current wall-clock time as an RFC 3339 UTC timestamp with microsecond
/// precision. The single source of truth for event timestamps.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// One normalized sampler observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateEvent {
    pub ts: String,
    pub source: String,
    pub session: String,
    pub app: String,
    pub window: String,
    pub meta: StateMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateMeta {
    /// Name of the sampler backend that produced the observation.
    pub sampler: String,
    /// Whether the raw state carried clipboard content. The content itself
    /// never appears in a state event.
    pub clipboard_observed: bool,
}

/// A derived embedding for changed window/clipboard content. The raw text is
/// not retained; only its hash, keyphrases and vector are.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedEvent {
    pub ts: String,
    pub source: String,
    pub session: String,
    pub app: String,
    pub window: String,
    pub keyphrases: Vec<String>,
    pub embedding: Vec<f32>,
    /// `sha256:<hex>` of the embedded text.
    pub hash_id: String,
    pub privacy: Privacy,
    pub meta: EmbedMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Privacy {
    pub raw_retained: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedMeta {
    /// Identifier of the embedding model/backend.
    pub model: String,
}
