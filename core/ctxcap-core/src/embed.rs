//! Pluggable embedding capability.
//!
//! The real model lives outside this crate; sessions receive an [`Embedder`]
//! at start. [`HashEmbedder`] is the deterministic built-in: a hash-derived
//! pseudo-embedding that is stable across machines, which keeps the whole
//! pipeline testable without pulling in a model runtime.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::Result;

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-zÀ-ÿ0-9_]+").expect("static word regex"));

const STOPWORDS: &[&str] = &[
    "the", "and", "or", "a", "an", "of", "for", "to", "in", "on", "mit", "und", "oder", "der",
    "die", "das", "ein", "eine", "ist",
];

const KEYPHRASE_TOP_K: usize = 5;

/// Output of one embedding computation.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub keyphrases: Vec<String>,
    /// Hex SHA-256 of the embedded text (no `sha256:` prefix).
    pub content_hash: String,
}

/// Embedding capability, injected at session start.
pub trait Embedder {
    /// Model identifier recorded in event metadata.
    fn model_name(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Hex SHA-256 of a string. Also used by the trigger for clipboard
/// fingerprints, so trigger and embedder agree on content identity.
pub fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// Crude frequency-based keyphrase extraction: lowercase tokens longer than
/// three characters, stopword-filtered, top 5 by count then lexicographic.
pub fn keyphrases(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for token in WORD_RE.find_iter(&lowered) {
        let word = token.as_str();
        if word.len() <= 3 || STOPWORDS.contains(&word) {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }

    let mut items: Vec<(&str, usize)> = counts.into_iter().collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    items
        .into_iter()
        .take(KEYPHRASE_TOP_K)
        .map(|(word, _)| word.to_string())
        .collect()
}

/// Deterministic hash-derived pseudo-embedding in [-0.5, 0.5).
///
/// Each output dimension comes from one digest byte; dimensions beyond one
/// digest are filled from follow-up digests over `text` plus a block
/// counter.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dim: 32 }
    }
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn digest_bytes(&self, text: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.dim);
        let mut block: u32 = 0;
        while bytes.len() < self.dim {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            if block > 0 {
                hasher.update(block.to_le_bytes());
            }
            bytes.extend_from_slice(&hasher.finalize());
            block += 1;
        }
        bytes.truncate(self.dim);
        bytes
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash32"
    }

    fn embed(&self, text: &str) -> Result<Embedding> {
        let vector = self
            .digest_bytes(text)
            .into_iter()
            .map(|b| f32::from(b) / 255.0 - 0.5)
            .collect();
        Ok(Embedding {
            vector,
            keyphrases: keyphrases(text),
            content_hash: sha256_hex(text),
        })
    }
}
