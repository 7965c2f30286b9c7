//! Session lifecycle: start, the blocking run loop, and stop/status as
//! invoked from separate short-lived processes.
//!
//! State machine: NEW → ACTIVE → STOPPING → STOPPED. The owning process is
//! solely responsible for transitioning out of ACTIVE; a `stop` invocation
//! only *requests* shutdown via SIGTERM and leaves cleanup to the owner,
//! except after a forced kill, when the owner can no longer clean up and
//! the stopping process does it instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::embed::Embedder;
use crate::error::Result;
use crate::events::{now_iso, EmbedEvent, EmbedMeta, Privacy, EMBED_SOURCE};
use crate::process::{self, Liveness};
use crate::sampler::{normalize, RawState, Sampler};
use crate::state::{self, ActiveMarker, AuditRecord};
use crate::storage::StorageConfig;
use crate::trigger::EmbedTrigger;
use crate::wal;

/// How often the stopping process re-checks the owner while waiting out the
/// grace period.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A created session, owned by the process that started it.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: String,
    pub pid: u32,
    pub started_ts: String,
    pub config: SessionConfig,
    pub wal_path: std::path::PathBuf,
}

/// Outcome of a `stop` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// No marker on disk.
    NoActiveSession,
    /// Marker referenced a dead pid; the marker was reclaimed.
    StaleRemoved { pid: u32 },
    /// The recorded pid is alive but could not be verified as ctxcap.
    /// Nothing was signaled or mutated.
    IdentityRefused { pid: u32 },
    /// SIGTERM delivered and the owner exited within the grace period.
    /// Cleanup is the owner's.
    Stopped { session_id: String, pid: u32 },
    /// The owner ignored SIGTERM and was SIGKILLed; the caller performed
    /// the cleanup the owner no longer could.
    Forced { session_id: String, pid: u32 },
}

/// Merged view reported by `status`.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub marker: Option<ActiveMarker>,
    /// Whether the recorded pid is alive. Meaningless when `marker` is None.
    pub alive: bool,
    /// Whether the live process looks like one of ours (best effort).
    pub identified: bool,
    /// Whether this invocation reclaimed a stale marker.
    pub stale_removed: bool,
}

/// Creates a session: id assignment, directories, sampler start, audit and
/// marker writes (NEW → ACTIVE). The caller then enters [`run_session`].
pub fn start_session(
    storage: &StorageConfig,
    mut config: SessionConfig,
    sampler: &mut dyn Sampler,
) -> Result<SessionHandle> {
    config.validate()?;
    config.apply_env_fallback();
    storage.ensure_dirs()?;

    let id = Uuid::new_v4().to_string();
    sampler.start(&id, &config)?;

    let handle = SessionHandle {
        wal_path: storage.wal_file(&id),
        pid: std::process::id(),
        started_ts: now_iso(),
        config,
        id,
    };

    state::write_audit(
        storage,
        &AuditRecord {
            session_id: handle.id.clone(),
            ts_started: handle.started_ts.clone(),
            pid: handle.pid,
            wal_path: handle.wal_path.clone(),
            config: handle.config.clone(),
            sampler: sampler.name().to_string(),
        },
    )?;
    state::write_active(
        storage,
        &ActiveMarker {
            session_id: handle.id.clone(),
            pid: handle.pid,
            wal_path: handle.wal_path.clone(),
            config: handle.config.clone(),
            active: true,
        },
    )?;

    info!(session = %handle.id, pid = handle.pid, "Session active");
    Ok(handle)
}

/// Runs the blocking loop until `shutdown` is set, then performs the
/// owner-side cleanup (ACTIVE → STOPPING → STOPPED). Cleanup runs on every
/// exit path; its own failure is a warning, not an abort.
pub fn run_session(
    storage: &StorageConfig,
    handle: &SessionHandle,
    sampler: &mut dyn Sampler,
    embedder: Option<&dyn Embedder>,
    shutdown: &AtomicBool,
) -> Result<()> {
    let loop_result = run_loop(handle, sampler, embedder, shutdown);

    // STOPPING: the owner tears down regardless of how the loop ended.
    if let Err(err) = sampler.stop(&handle.id) {
        warn!(session = %handle.id, error = %err, "Sampler stop failed");
    }
    if let Err(err) = state::finalize_audit(storage, &handle.id) {
        warn!(session = %handle.id, error = %err, "Audit finalization failed");
    }
    match state::clear_active(storage, handle.pid) {
        Ok(true) => {}
        Ok(false) => {
            warn!(session = %handle.id, "Active marker was not ours to clear");
        }
        Err(err) => {
            warn!(session = %handle.id, error = %err, "Marker cleanup failed");
        }
    }
    info!(session = %handle.id, "Session stopped");

    loop_result
}

/// One tick: poll, normalize, append, evaluate the embedding trigger.
/// Single-threaded and cooperative; the only suspension point is the
/// drift-corrected end-of-tick sleep.
fn run_loop(
    handle: &SessionHandle,
    sampler: &mut dyn Sampler,
    embedder: Option<&dyn Embedder>,
    shutdown: &AtomicBool,
) -> Result<()> {
    let interval = Duration::from_millis(handle.config.poll_interval_ms);
    let mut trigger = match (handle.config.embeddings_enabled, embedder) {
        (true, Some(_)) => Some(EmbedTrigger::new(&handle.config)),
        _ => None,
    };

    let mut next_deadline = Instant::now() + interval;

    while !shutdown.load(Ordering::SeqCst) {
        let now = Instant::now();
        match sampler.poll(&handle.id) {
            Ok(states) => {
                for raw in &states {
                    if let Err(err) = record_observation(
                        handle,
                        sampler.name(),
                        raw,
                        embedder,
                        trigger.as_mut(),
                        now,
                    ) {
                        // Fatal for this tick only; previously written
                        // lines are untouched.
                        warn!(session = %handle.id, error = %err, "Append failed; skipping tick");
                        break;
                    }
                }
            }
            Err(err) => {
                warn!(session = %handle.id, error = %err, "Sampler poll failed; skipping tick");
            }
        }

        // The deadline advances by exact interval increments, so a slow
        // tick does not shift all subsequent ticks.
        let now = Instant::now();
        if next_deadline > now {
            thread::sleep(next_deadline - now);
        }
        next_deadline += interval;
    }

    Ok(())
}

fn record_observation(
    handle: &SessionHandle,
    sampler_name: &str,
    raw: &RawState,
    embedder: Option<&dyn Embedder>,
    trigger: Option<&mut EmbedTrigger>,
    now: Instant,
) -> Result<()> {
    let event = normalize(raw, &handle.id, sampler_name);
    wal::append(&handle.wal_path, &event)?;

    let (Some(trigger), Some(embedder)) = (trigger, embedder) else {
        return Ok(());
    };
    let Some(candidate) = trigger.evaluate(raw, now) else {
        return Ok(());
    };

    let embedding = embedder.embed(&candidate.text)?;
    let embed_event = EmbedEvent {
        ts: now_iso(),
        source: EMBED_SOURCE.to_string(),
        session: handle.id.clone(),
        app: raw.app.clone(),
        window: raw.window.clone(),
        keyphrases: embedding.keyphrases,
        embedding: embedding.vector,
        hash_id: format!("sha256:{}", embedding.content_hash),
        privacy: Privacy {
            raw_retained: false,
        },
        meta: EmbedMeta {
            model: embedder.model_name().to_string(),
        },
    };
    wal::append(&handle.wal_path, &embed_event)?;
    trigger.commit(&candidate, now);
    Ok(())
}

/// Requests shutdown of the active session from a separate process.
///
/// Never signals a pid without the identity check, and never deletes the
/// marker while its owner may still be writing: the owner cleans up after
/// SIGTERM, the caller only after a forced kill.
pub fn stop_session(storage: &StorageConfig, grace: Duration) -> Result<StopOutcome> {
    let Some(marker) = state::read_active(storage)? else {
        return Ok(StopOutcome::NoActiveSession);
    };

    match process::probe(marker.pid) {
        Liveness::Dead => {
            state::remove_active(storage)?;
            return Ok(StopOutcome::StaleRemoved { pid: marker.pid });
        }
        Liveness::Denied => {
            return Err(crate::error::CtxError::PermissionDenied { pid: marker.pid });
        }
        Liveness::Alive => {}
    }

    if !process::verify_identity(marker.pid) {
        return Ok(StopOutcome::IdentityRefused { pid: marker.pid });
    }

    match process::send_terminate(marker.pid) {
        Ok(()) => {}
        Err(crate::error::CtxError::ProcessLookup { pid }) => {
            // Exited between the probe and the signal.
            state::remove_active(storage)?;
            return Ok(StopOutcome::StaleRemoved { pid });
        }
        Err(err) => return Err(err),
    }

    if wait_for_exit(marker.pid, grace) {
        return Ok(StopOutcome::Stopped {
            session_id: marker.session_id,
            pid: marker.pid,
        });
    }

    // Escalation: the owner cannot clean up after SIGKILL, so we do.
    warn!(pid = marker.pid, "Grace period expired; forcing termination");
    match process::send_kill(marker.pid) {
        Ok(()) | Err(crate::error::CtxError::ProcessLookup { .. }) => {}
        Err(err) => return Err(err),
    }
    wait_for_exit(marker.pid, grace);
    if let Err(err) = state::finalize_audit(storage, &marker.session_id) {
        warn!(session = %marker.session_id, error = %err, "Audit finalization failed");
    }
    state::remove_active(storage)?;
    Ok(StopOutcome::Forced {
        session_id: marker.session_id,
        pid: marker.pid,
    })
}

fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !process::is_pid_alive(pid) {
            return true;
        }
        thread::sleep(STOP_POLL_INTERVAL);
    }
    !process::is_pid_alive(pid)
}

/// Reads the merged marker/liveness view without mutating anything except
/// reclaiming a provably stale marker.
pub fn session_status(storage: &StorageConfig) -> Result<SessionStatus> {
    let Some(marker) = state::read_active(storage)? else {
        return Ok(SessionStatus {
            marker: None,
            alive: false,
            identified: false,
            stale_removed: false,
        });
    };

    let alive = process::is_pid_alive(marker.pid);
    if !alive {
        // Tolerate the owner racing us on the file: removal of an
        // already-gone marker is a no-op.
        state::remove_active(storage)?;
        return Ok(SessionStatus {
            marker: Some(marker),
            alive: false,
            identified: false,
            stale_removed: true,
        });
    }

    let identified = process::verify_identity(marker.pid);
    Ok(SessionStatus {
        marker: Some(marker),
        alive: true,
        identified,
        stale_removed: false,
    })
}
