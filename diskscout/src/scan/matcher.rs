use base64::engine::general_purpose::STANDARD as B64_STD;
use base64::Engine as _;
use memchr::memmem;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::accelerator::ACCELERATED_MIN_LEN;
use crate::errors::{ScanError, ScanResult};
use crate::metrics::ScanMetrics;

/// How the needle of a content predicate was supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Hex,
    Base64,
}

/// A decoded content predicate.
///
/// Text needles are stored ASCII-lowercased and compared case-insensitively;
/// hex and base64 needles are raw bytes compared exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPattern {
    kind: ContentKind,
    needle: Vec<u8>,
    display: String,
}

impl ContentPattern {
    pub fn text(text: &str) -> ScanResult<Self> {
        if text.is_empty() {
            return Err(ScanError::pattern_decode("content text is empty"));
        }
        Ok(Self {
            kind: ContentKind::Text,
            needle: text.as_bytes().to_ascii_lowercase(),
            display: text.to_string(),
        })
    }

    /// Decodes a hex string. ASCII whitespace between digits is ignored.
    pub fn from_hex(hex: &str) -> ScanResult<Self> {
        let digits: Vec<u8> = hex
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        if digits.is_empty() {
            return Err(ScanError::pattern_decode("hex pattern is empty"));
        }
        if digits.len() % 2 != 0 {
            return Err(ScanError::pattern_decode(format!(
                "hex pattern '{}' has an odd number of digits",
                hex
            )));
        }

        let needle = digits
            .chunks_exact(2)
            .map(|pair| Ok((hex_digit(pair[0])? << 4) | hex_digit(pair[1])?))
            .collect::<ScanResult<Vec<u8>>>()?;

        Ok(Self {
            kind: ContentKind::Hex,
            needle,
            display: hex.to_string(),
        })
    }

    pub fn from_base64(encoded: &str) -> ScanResult<Self> {
        let needle = B64_STD.decode(encoded.trim()).map_err(|e| {
            ScanError::pattern_decode(format!("base64 pattern '{}': {}", encoded, e))
        })?;
        if needle.is_empty() {
            return Err(ScanError::pattern_decode("base64 pattern decodes to nothing"));
        }
        Ok(Self {
            kind: ContentKind::Base64,
            needle,
            display: encoded.to_string(),
        })
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn needle(&self) -> &[u8] {
        &self.needle
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.kind == ContentKind::Text
    }
}

impl fmt::Display for ContentPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ContentKind::Text => write!(f, "'{}'", self.display),
            ContentKind::Hex => write!(f, "hex {}", self.display),
            ContentKind::Base64 => write!(f, "base64 {}", self.display),
        }
    }
}

fn hex_digit(b: u8) -> ScanResult<u8> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(ScanError::pattern_decode(format!(
            "invalid hex digit '{}'",
            b as char
        ))),
    }
}

/// An exact (case-sensitive) substring test over one chunk.
///
/// Implementations must agree with each other on every input; they differ only
/// in how the work is carried out.
pub trait SearchStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn contains(&self, haystack: &[u8], needle: &[u8]) -> ScanResult<bool>;
}

/// Sequential scan built on `memchr::memmem`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceSearch;

impl SearchStrategy for ReferenceSearch {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn contains(&self, haystack: &[u8], needle: &[u8]) -> ScanResult<bool> {
        Ok(memmem::find(haystack, needle).is_some())
    }
}

/// Applies one content predicate to successive chunks of a file.
///
/// Each chunk is tested on its own: a needle straddling two chunks is not
/// reported. Callers that need it should pick a chunk size well above the
/// needle length.
///
/// A matcher belongs to a single worker. If the accelerated strategy fails the
/// matcher falls back to the reference strategy for the rest of its life.
#[derive(Debug)]
pub struct PatternMatcher {
    pattern: ContentPattern,
    accelerated: Option<Arc<dyn SearchStrategy>>,
    reference: ReferenceSearch,
    fold_buffer: Vec<u8>,
    metrics: ScanMetrics,
}

impl PatternMatcher {
    /// Creates a matcher that only uses the reference strategy
    pub fn new(pattern: ContentPattern) -> Self {
        Self::with_metrics(pattern, None, ScanMetrics::new())
    }

    /// Creates a matcher that prefers the accelerated strategy when one is given
    pub fn with_metrics(
        pattern: ContentPattern,
        accelerated: Option<Arc<dyn SearchStrategy>>,
        metrics: ScanMetrics,
    ) -> Self {
        debug!(
            "Pattern {} uses {} search",
            pattern,
            accelerated
                .as_ref()
                .map_or(ReferenceSearch.name(), |strategy| strategy.name())
        );
        Self {
            pattern,
            accelerated,
            reference: ReferenceSearch,
            fold_buffer: Vec::new(),
            metrics,
        }
    }

    /// Reports whether the pattern occurs inside `chunk`
    pub fn matches(&mut self, chunk: &[u8]) -> bool {
        self.metrics.record_chunk();

        let haystack: &[u8] = if self.pattern.is_case_insensitive() {
            self.fold_buffer.clear();
            self.fold_buffer
                .extend(chunk.iter().map(|b| b.to_ascii_lowercase()));
            &self.fold_buffer
        } else {
            chunk
        };
        let needle = self.pattern.needle.as_slice();

        let mut degraded = false;
        if haystack.len() >= ACCELERATED_MIN_LEN {
            if let Some(accel) = &self.accelerated {
                match accel.contains(haystack, needle) {
                    Ok(found) => {
                        self.metrics.record_accelerated_chunk();
                        return found;
                    }
                    Err(e) => {
                        warn!("{}; falling back to reference search", e);
                        degraded = true;
                    }
                }
            }
        }
        if degraded {
            self.metrics.record_accelerator_fallback();
            self.accelerated = None;
        }

        // The reference strategy cannot fail
        self.reference.contains(haystack, needle).unwrap_or(false)
    }
}
