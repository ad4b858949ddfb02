//! The story record kept in the pool.
//!
//! A `Story` is built by the engine only after a feed item has passed every
//! check, and is never modified afterwards. Pool pruning is the only thing
//! that removes one.
//!
//! ## For contributors
//!
//! Display code should treat stories as read-only. If a story needs extra
//! presentation data, derive it at draw time rather than adding mutable
//! fields here.

use crate::validate::INVALID_TIMESTAMP;

/// Display time shown for synthetic stories.
pub const PLACEHOLDER_TIME: &str = "--:--";

/// A single accepted headline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    /// Sanitized, printable-ASCII headline.
    pub headline: String,

    /// Validated link to the full article. Empty for placeholders.
    pub url: String,

    /// Publish time in epoch seconds, or [`INVALID_TIMESTAMP`] when unknown.
    pub timestamp: i64,

    /// Pre-rendered short time such as `"Wed 9:30 AM"`.
    pub time_str: String,

    /// Index of the owning source in the registry.
    pub source: usize,

    /// `true` for the "no data" stand-ins inserted when the pool runs dry.
    pub synthetic: bool,
}

impl Story {
    /// A synthetic stand-in shown while no real stories are available.
    pub fn placeholder(headline: impl Into<String>, source: usize) -> Self {
        Self {
            headline: headline.into(),
            url: String::new(),
            timestamp: INVALID_TIMESTAMP,
            time_str: PLACEHOLDER_TIME.to_string(),
            source,
            synthetic: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_synthetic_and_undated() {
        let story = Story::placeholder("WAITING FOR SYNC...", 1);
        assert!(story.synthetic);
        assert_eq!(story.timestamp, INVALID_TIMESTAMP);
        assert_eq!(story.time_str, PLACEHOLDER_TIME);
        assert_eq!(story.source, 1);
        assert!(story.url.is_empty());
    }
}
