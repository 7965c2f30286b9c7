//! Embedding trigger: decides, per normalized observation, whether enough
//! content changed to warrant a derived embedding record.
//!
//! Retained state is process-local and never persisted. A candidate is
//! *considered* when the window title or the clipboard fingerprint changed,
//! and *accepted* when the assembled text is long enough, its hash differs
//! from the last embedded content, and the minimum interval has elapsed.
//! The interval guard is a secondary throttle on top of change detection:
//! it bounds embedding cost under rapid window-switching without ever
//! re-embedding unchanged content on a timer.
//!
//! All four pieces of retained state update only when a candidate is
//! committed, so content rejected by the rate limit is picked up again on a
//! later tick instead of being dropped.

use std::time::{Duration, Instant};

use crate::config::SessionConfig;
use crate::embed::sha256_hex;
use crate::sampler::RawState;

/// An accepted embedding candidate. Carries the values the trigger will
/// retain once the caller has appended the event.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Assembled input text (window title and clipboard, blank-line joined).
    pub text: String,
    /// Hex SHA-256 of `text`.
    pub content_hash: String,
    window: String,
    clip_fingerprint: Option<String>,
}

/// Change-detection and debounce state for one session.
#[derive(Debug)]
pub struct EmbedTrigger {
    min_chars: usize,
    min_interval: Duration,
    clipboard_allowed: bool,
    last_window: Option<String>,
    last_clip_fingerprint: Option<String>,
    last_embedded_hash: Option<String>,
    last_embed_at: Option<Instant>,
}

impl EmbedTrigger {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            min_chars: config.embed_min_chars,
            min_interval: Duration::try_from_secs_f64(config.embed_min_interval_s)
                .unwrap_or(Duration::ZERO),
            clipboard_allowed: config.clipboard_allowed,
            last_window: None,
            last_clip_fingerprint: None,
            last_embedded_hash: None,
            last_embed_at: None,
        }
    }

    /// Evaluates one observation. Returns an accepted candidate, or `None`
    /// when nothing changed or every guard rejected it.
    pub fn evaluate(&mut self, raw: &RawState, now: Instant) -> Option<Candidate> {
        // Clipboard disabled by config never contributes, even if the
        // sampler happens to report it.
        let clipboard = if self.clipboard_allowed {
            raw.clipboard.as_deref().map(str::trim).filter(|c| !c.is_empty())
        } else {
            None
        };
        let clip_fingerprint = clipboard.map(sha256_hex);

        let window_changed = self.last_window.as_deref() != Some(raw.window.as_str());
        let clipboard_changed = self.last_clip_fingerprint != clip_fingerprint;
        if !window_changed && !clipboard_changed {
            return None;
        }

        let mut chunks: Vec<&str> = Vec::with_capacity(2);
        let window = raw.window.trim();
        if !window.is_empty() {
            chunks.push(window);
        }
        if let Some(clip) = clipboard {
            chunks.push(clip);
        }
        let text = chunks.join("\n\n");
        if text.is_empty() || text.chars().count() < self.min_chars {
            return None;
        }

        let content_hash = sha256_hex(&text);
        if self.last_embedded_hash.as_deref() == Some(content_hash.as_str()) {
            return None;
        }

        if let Some(last) = self.last_embed_at {
            if now.duration_since(last) < self.min_interval {
                return None;
            }
        }

        Some(Candidate {
            text,
            content_hash,
            window: raw.window.clone(),
            clip_fingerprint,
        })
    }

    /// Records a committed candidate after its embed event was appended.
    /// Updates all retained state in one place.
    pub fn commit(&mut self, candidate: &Candidate, now: Instant) {
        self.last_window = Some(candidate.window.clone());
        self.last_clip_fingerprint = candidate.clip_fingerprint.clone();
        self.last_embedded_hash = Some(candidate.content_hash.clone());
        self.last_embed_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig {
            clipboard_allowed: true,
            embed_min_chars: 12,
            embed_min_interval_s: 0.0,
            ..Default::default()
        }
    }

    fn state(window: &str, clipboard: Option<&str>) -> RawState {
        RawState {
            app: "editor".to_string(),
            window: window.to_string(),
            clipboard: clipboard.map(str::to_string),
        }
    }

    fn drive(trigger: &mut EmbedTrigger, raw: &RawState, now: Instant) -> Option<Candidate> {
        let candidate = trigger.evaluate(raw, now);
        if let Some(c) = &candidate {
            trigger.commit(c, now);
        }
        candidate
    }

    #[test]
    fn test_first_observation_triggers() {
        let mut trigger = EmbedTrigger::new(&config());
        let candidate = drive(
            &mut trigger,
            &state("a reasonably long window title", None),
            Instant::now(),
        );
        assert!(candidate.is_some());
    }

    #[test]
    fn test_unchanged_content_never_triggers() {
        let mut trigger = EmbedTrigger::new(&config());
        let raw = state("a reasonably long window title", Some("copied text"));
        let now = Instant::now();

        assert!(drive(&mut trigger, &raw, now).is_some());
        for _ in 0..5 {
            assert!(drive(&mut trigger, &raw, now).is_none());
        }
    }

    #[test]
    fn test_one_candidate_per_distinct_clipboard_fingerprint() {
        let mut trigger = EmbedTrigger::new(&config());
        let now = Instant::now();
        let window = "a constant window title";

        let mut accepted = 0;
        for clip in ["first clipboard payload", "first clipboard payload", "second clipboard payload", "second clipboard payload"] {
            if drive(&mut trigger, &state(window, Some(clip)), now).is_some() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 2);
    }

    #[test]
    fn test_short_text_rejected() {
        let mut trigger = EmbedTrigger::new(&config());
        assert!(drive(&mut trigger, &state("short", None), Instant::now()).is_none());
    }

    #[test]
    fn test_whitespace_only_never_triggers() {
        let mut trigger = EmbedTrigger::new(&config());
        assert!(drive(&mut trigger, &state("   ", Some("  \n ")), Instant::now()).is_none());
    }

    #[test]
    fn test_clipboard_disabled_never_contributes() {
        let mut trigger = EmbedTrigger::new(&SessionConfig {
            clipboard_allowed: false,
            embed_min_chars: 12,
            embed_min_interval_s: 0.0,
            ..Default::default()
        });
        let now = Instant::now();

        // Window alone is too short; the (long) clipboard must not rescue it.
        assert!(drive(&mut trigger, &state("short", Some("a very long clipboard payload")), now).is_none());

        // Clipboard-only changes are invisible when capture is disabled.
        let window = "a reasonably long window title";
        assert!(drive(&mut trigger, &state(window, Some("payload one here")), now).is_some());
        assert!(drive(&mut trigger, &state(window, Some("payload two here")), now).is_none());
    }

    #[test]
    fn test_recombined_text_suppressed_by_hash() {
        let mut trigger = EmbedTrigger::new(&config());
        let now = Instant::now();

        assert!(drive(&mut trigger, &state("a reasonably long window title", None), now).is_some());

        // The title string changes (padding), so change detection fires, but
        // the trimmed text assembles to the previously embedded content.
        let padded = state("  a reasonably long window title  ", None);
        assert!(trigger.evaluate(&padded, now).is_none());
    }

    #[test]
    fn test_clipboard_flap_changes_hash_and_triggers() {
        let mut trigger = EmbedTrigger::new(&config());
        let now = Instant::now();
        let window = "a reasonably long window title";

        assert!(drive(&mut trigger, &state(window, Some("clip payload")), now).is_some());
        // Clipboard disappearing shrinks the assembled text to the window
        // alone: new fingerprint, new hash, new embed.
        assert!(drive(&mut trigger, &state(window, None), now).is_some());
        // Steady state afterwards stays quiet.
        assert!(trigger.evaluate(&state(window, None), now).is_none());
    }

    #[test]
    fn test_unrepresentable_interval_does_not_panic() {
        // Validation rejects this upstream, but construction must stay safe.
        let mut trigger = EmbedTrigger::new(&SessionConfig {
            clipboard_allowed: true,
            embed_min_chars: 12,
            embed_min_interval_s: f64::MAX,
            ..Default::default()
        });
        assert!(drive(
            &mut trigger,
            &state("a reasonably long window title", None),
            Instant::now()
        )
        .is_some());
    }

    #[test]
    fn test_interval_guard_throttles_rapid_changes() {
        let mut trigger = EmbedTrigger::new(&SessionConfig {
            clipboard_allowed: true,
            embed_min_chars: 12,
            embed_min_interval_s: 3600.0,
            ..Default::default()
        });
        let now = Instant::now();

        assert!(drive(&mut trigger, &state("first long window title", None), now).is_some());
        // Changed content inside the interval window is rejected for now...
        assert!(drive(&mut trigger, &state("second long window title", None), now).is_none());
        // ...but not forgotten: it is reconsidered on a later tick.
        let later = now + Duration::from_secs(7200);
        assert!(drive(&mut trigger, &state("second long window title", None), later).is_some());
    }
}
