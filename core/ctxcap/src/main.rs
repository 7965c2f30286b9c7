//! ctxcap: local context-capture session daemon.
//!
//! `start` runs the blocking sampling loop in the foreground; `stop` and
//! `status` are short-lived invocations that coordinate with the running
//! process through the marker file and OS signals.
//!
//! ## Exit codes
//!
//! - `0` success (including "no active session" from `status`)
//! - `1` nothing to stop / stale session, identity-check refusal, or
//!   permission denied
//! - `2` unreadable persisted state

mod logging;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::{info, warn};

use ctxcap_core::error::CtxError;
use ctxcap_core::lifecycle::{self, StopOutcome};
use ctxcap_core::{
    Embedder, HashEmbedder, NullSampler, Sampler, SessionConfig, StorageConfig, SyntheticSampler,
};

/// Environment variable selecting the sampler backend (`null` | `synthetic`).
const SAMPLER_ENV_VAR: &str = "CTXCAP_SAMPLER";

/// How long `stop` waits for cooperative shutdown before escalating.
const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "ctxcap")]
#[command(about = "Local context-capture session daemon")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a capture session in the foreground (blocks until signaled)
    Start {
        /// Allow clipboard content to be observed
        #[arg(long)]
        clipboard: bool,

        /// Allow screenshot capture
        #[arg(long)]
        screenshots: bool,

        /// Sampling interval in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 500)]
        poll_interval: u64,

        /// Derive text embeddings from changed content
        #[arg(long)]
        embed: bool,
    },

    /// Request shutdown of the active session
    Stop,

    /// Report the active session, if any
    Status,
}

fn main() {
    let cli = Cli::parse();
    let storage = StorageConfig::default();
    let logging_guard = logging::init(&storage);

    let code = match cli.command {
        Commands::Start {
            clipboard,
            screenshots,
            poll_interval,
            embed,
        } => cmd_start(
            &storage,
            SessionConfig {
                clipboard_allowed: clipboard,
                screenshots_allowed: screenshots,
                poll_interval_ms: poll_interval,
                embeddings_enabled: embed,
                ..Default::default()
            },
        ),
        Commands::Stop => cmd_stop(&storage),
        Commands::Status => cmd_status(&storage),
    };
    // process::exit skips destructors; flush buffered log lines first.
    drop(logging_guard);
    std::process::exit(code);
}

fn select_sampler() -> Box<dyn Sampler> {
    match std::env::var(SAMPLER_ENV_VAR).as_deref() {
        Ok("synthetic") => Box::new(SyntheticSampler::default()),
        _ => Box::new(NullSampler),
    }
}

fn cmd_start(storage: &StorageConfig, config: SessionConfig) -> i32 {
    // Handlers go in before any state is persisted, so an early signal can
    // never strand a marker, and a registration failure has nothing to
    // tear down.
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        if let Err(err) = signal_hook::flag::register(signal, Arc::clone(&shutdown)) {
            warn!(signal, error = %err, "Signal handler registration failed");
            eprintln!("start failed: cannot install signal handler: {}", err);
            return 1;
        }
    }

    let mut sampler = select_sampler();
    let handle = match lifecycle::start_session(storage, config, sampler.as_mut()) {
        Ok(handle) => handle,
        Err(err) => {
            warn!(error = %err, "Start failed");
            eprintln!("start failed: {}", err);
            return exit_code_for(&err);
        }
    };

    println!(
        "session {} active (clipboard={}, screenshots={}, embed={})",
        handle.id,
        handle.config.clipboard_allowed,
        handle.config.screenshots_allowed,
        handle.config.embeddings_enabled
    );
    println!("wal: {}", handle.wal_path.display());

    let embedder = HashEmbedder::default();
    let embedder_ref: Option<&dyn Embedder> = if handle.config.embeddings_enabled {
        Some(&embedder)
    } else {
        None
    };
    let result = lifecycle::run_session(storage, &handle, sampler.as_mut(), embedder_ref, &shutdown);

    println!("session stopped.");
    match result {
        Ok(()) => 0,
        Err(err) => {
            warn!(session = %handle.id, error = %err, "Session ended with error");
            eprintln!("session ended with error: {}", err);
            exit_code_for(&err)
        }
    }
}

fn cmd_stop(storage: &StorageConfig) -> i32 {
    match lifecycle::stop_session(storage, STOP_GRACE) {
        Ok(StopOutcome::NoActiveSession) => {
            info!("Stop requested with no active session");
            println!("no active session.");
            1
        }
        Ok(StopOutcome::StaleRemoved { pid }) => {
            info!(pid, "Reclaimed stale marker on stop");
            println!("no active session (stale marker for pid {} removed).", pid);
            1
        }
        Ok(StopOutcome::IdentityRefused { pid }) => {
            warn!(pid, "Refused to signal unverified process");
            println!(
                "refusing to stop: pid {} is alive but not verifiably ctxcap.",
                pid
            );
            1
        }
        Ok(StopOutcome::Stopped { session_id, pid }) => {
            info!(session = %session_id, pid, "Session stopped cooperatively");
            println!("session {} stopped (pid {}).", session_id, pid);
            0
        }
        Ok(StopOutcome::Forced { session_id, pid }) => {
            warn!(session = %session_id, pid, "Session force-terminated");
            println!(
                "session {} force-terminated (pid {} ignored SIGTERM).",
                session_id, pid
            );
            0
        }
        Err(err) => {
            warn!(error = %err, "Stop failed");
            eprintln!("stop failed: {}", err);
            exit_code_for(&err)
        }
    }
}

fn cmd_status(storage: &StorageConfig) -> i32 {
    match lifecycle::session_status(storage) {
        Ok(status) => {
            let stale_removed = status.stale_removed;
            let identified = status.identified;
            match status.marker {
                None => println!("no active session."),
                Some(marker) if stale_removed => {
                    info!(pid = marker.pid, "Reclaimed stale marker on status");
                    println!(
                        "no active session (stale marker for pid {} removed).",
                        marker.pid
                    );
                }
                Some(marker) => {
                    let identity = if identified { "" } else { " [unverified process]" };
                    println!(
                        "session {} active (pid {}, wal {}){}",
                        marker.session_id,
                        marker.pid,
                        marker.wal_path.display(),
                        identity
                    );
                }
            }
            0
        }
        Err(err) => {
            warn!(error = %err, "Status failed");
            eprintln!("status failed: {}", err);
            exit_code_for(&err)
        }
    }
}

fn exit_code_for(err: &CtxError) -> i32 {
    match err {
        CtxError::StateUnreadable { .. } => 2,
        _ => 1,
    }
}
