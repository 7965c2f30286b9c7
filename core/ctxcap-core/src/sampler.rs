//! Sampler boundary: the interface to whatever actually observes desktop
//! state, plus normalization into canonical state events.
//!
//! The native OS sampler lives behind the [`Sampler`] trait. `poll` is
//! non-blocking and an empty result means "no change since last poll".
//! Normalization is the only place current wall-clock time enters the log.

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::{CtxError, Result};
use crate::events::{now_iso, StateEvent, StateMeta, STATE_SOURCE};

/// One raw observation from a sampler backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawState {
    pub app: String,
    pub window: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clipboard: Option<String>,
}

/// The external sampler contract.
///
/// - `start` failure is fatal to the session attempt.
/// - `poll` failure is tolerated by skipping the current tick.
/// - `stop` is idempotent and safe to call even if already stopped; its
///   failure is logged but never blocks cleanup.
pub trait Sampler {
    /// Backend name recorded in event metadata.
    fn name(&self) -> &str;

    fn start(&mut self, session_id: &str, config: &SessionConfig) -> Result<()>;

    fn poll(&mut self, session_id: &str) -> Result<Vec<RawState>>;

    fn stop(&mut self, session_id: &str) -> Result<()>;
}

/// Maps a raw observation into a canonical state event, attaching a fresh
/// timestamp, the `os.context.state` source tag and the session id.
pub fn normalize(raw: &RawState, session_id: &str, sampler_name: &str) -> StateEvent {
    StateEvent {
        ts: now_iso(),
        source: STATE_SOURCE.to_string(),
        session: session_id.to_string(),
        app: raw.app.clone(),
        window: raw.window.clone(),
        meta: StateMeta {
            sampler: sampler_name.to_string(),
            clipboard_observed: raw.clipboard.as_deref().is_some_and(|c| !c.is_empty()),
        },
    }
}

/// Sampler that never reports. Default backend on hosts without a native
/// sampler; the session still produces a well-formed (empty) log.
#[derive(Debug, Default)]
pub struct NullSampler;

impl Sampler for NullSampler {
    fn name(&self) -> &str {
        "null"
    }

    fn start(&mut self, _session_id: &str, _config: &SessionConfig) -> Result<()> {
        Ok(())
    }

    fn poll(&mut self, _session_id: &str) -> Result<Vec<RawState>> {
        Ok(Vec::new())
    }

    fn stop(&mut self, _session_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Development/test backend that fabricates one distinct observation per
/// poll. Selected with `CTXCAP_SAMPLER=synthetic`.
#[derive(Debug, Default)]
pub struct SyntheticSampler {
    started: bool,
    ticks: u64,
}

impl Sampler for SyntheticSampler {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn start(&mut self, _session_id: &str, _config: &SessionConfig) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn poll(&mut self, _session_id: &str) -> Result<Vec<RawState>> {
        if !self.started {
            return Err(CtxError::Sampler("synthetic sampler not started".to_string()));
        }
        self.ticks += 1;
        Ok(vec![RawState {
            app: "ctxcap.synthetic".to_string(),
            window: format!("synthetic window {}", self.ticks),
            clipboard: None,
        }])
    }

    fn stop(&mut self, _session_id: &str) -> Result<()> {
        self.started = false;
        Ok(())
    }
}
