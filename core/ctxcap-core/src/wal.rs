//! Append-only per-session event log (WAL).
//!
//! Each append writes exactly one newline-terminated compact JSON line under
//! an exclusive advisory lock, so concurrent writers sharing the same path
//! never interleave partial lines. The lock is scoped to the single write;
//! it is never held across a poll or a sleep.
//!
//! Durability is "flushed to the OS", not fsync. Within one process the
//! ordering is call order; across processes it is lock-acquisition order.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use fs2::FileExt;
use serde::Serialize;

use crate::error::Result;

/// Durably appends one record as a JSON line to the log at `path`, creating
/// parent directories if absent.
///
/// A failure here never corrupts previously written lines: the line is
/// written in one `write_all` under the lock, and the file is opened in
/// append mode.
pub fn append<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }

    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;
    let outcome = file.write_all(&line).and_then(|()| file.flush());
    let _ = fs2::FileExt::unlock(&file);
    outcome?;
    Ok(())
}

/// Reads every line of a log file as parsed JSON. Intended for inspection
/// and tests; the WAL itself is never read back by the run loop.
pub fn read_lines(path: &Path) -> Result<Vec<serde_json::Value>> {
    let content = fs_err::read_to_string(path)?;
    let mut records = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(line)?);
    }
    Ok(records)
}
