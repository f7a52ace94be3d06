//! Tunables for key resolution and the message pipeline.

/// Placeholder shown for bodies no strategy could recover.
pub const UNRECOVERABLE_SENTINEL: &str = "🔒 Message encrypted with an unrecoverable key";

/// Plaintext marker written over deleted message bodies.
pub const DELETED_MARKER: &str = "[Message deleted]";

/// Key resolver configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Minimum share of printable-ASCII characters for undecryptable content
    /// to be shown as-is.
    pub plaintext_min_ratio: f64,
    /// Content at or above this many characters is never treated as
    /// plaintext.
    pub plaintext_max_chars: usize,
    /// Placeholder substituted for unrecoverable bodies.
    pub sentinel: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            plaintext_min_ratio: 0.7,
            plaintext_max_chars: 1000,
            sentinel: UNRECOVERABLE_SENTINEL.to_string(),
        }
    }
}

/// Message pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Records fetched per load (newest first, presented oldest first).
    pub page_size: usize,
    /// Attach a soft integrity tag to every outgoing body.
    pub attach_integrity_tags: bool,
    /// Mark other participants' messages as read after a load.
    pub mark_read_on_load: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { page_size: 50, attach_integrity_tags: true, mark_read_on_load: true }
    }
}
