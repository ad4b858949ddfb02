//! Feed sources: static configuration plus per-source reliability counters.
//!
//! Sources are addressed by their index in the [`SourceRegistry`], and every
//! [`Story`] carries that index as its owner. The registry therefore never
//! reorders or removes sources once built.
//!
//! ## For contributors: adding a new source
//!
//! 1. Add an entry to the built-in list in `catalog.rs`, or add a
//!    `[[sources]]` table to the config file.
//! 2. Set `full_content = true` for WordPress-style feeds whose items carry a
//!    `<description>` / `<content:encoded>` body worth falling back on.
//! 3. Set `age_exempt = true` for feeds known to report stale or unreliable
//!    publish dates, so age pruning leaves their stories alone.
//!
//! Sources are refreshed in batches of `pool.batch_size` consecutive
//! indices, so keep related feeds together when ordering the list.

mod catalog;
pub mod http;
mod story;

pub use catalog::builtin_sources;
pub use http::{FeedTransport, HttpTransport};
pub use story::{Story, PLACEHOLDER_TIME};

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Styling
// ---------------------------------------------------------------------------

/// Named display colors, stored as RGB565 like the panel they came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    Black,
    White,
    Red,
    DarkRed,
    Blue,
    Navy,
    Cyan,
    Yellow,
    Green,
    DeepGreen,
    Charcoal,
    Gold,
    Orange,
    Teal,
    DarkBlue,
    Violet,
    Grey,
    Maroon,
    Purple,
    DarkGreen,
}

impl Palette {
    /// The packed 16-bit RGB565 value.
    pub fn rgb565(self) -> u16 {
        match self {
            Palette::Black => 0x0000,
            Palette::White => 0xFFFF,
            Palette::Red => 0xF800,
            Palette::DarkRed => 0xA000,
            Palette::Blue => 0x001F,
            Palette::Navy => 0x000F,
            Palette::Cyan => 0x07FF,
            Palette::Yellow => 0xFFE0,
            Palette::Green => 0x07E0,
            Palette::DeepGreen => 0x0200,
            Palette::Charcoal => 0x2124,
            Palette::Gold => 0xFEA0,
            Palette::Orange => 0xFD20,
            Palette::Teal => 0x0415,
            Palette::DarkBlue => 0x0010,
            Palette::Violet => 0x901F,
            Palette::Grey => 0x8410,
            Palette::Maroon => 0x8000,
            Palette::Purple => 0x8010,
            Palette::DarkGreen => 0x02A0,
        }
    }

    /// Expanded 8-bit-per-channel color.
    pub fn rgb(self) -> (u8, u8, u8) {
        let v = u32::from(self.rgb565());
        let r = ((v >> 11) & 0x1F) * 255 / 31;
        let g = ((v >> 5) & 0x3F) * 255 / 63;
        let b = (v & 0x1F) * 255 / 31;
        (r as u8, g as u8, b as u8)
    }
}

/// The three colors a story card is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStyle {
    /// Headline and accent color.
    pub text: Palette,
    /// Card background.
    pub background: Palette,
    /// Source-name color.
    pub title: Palette,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// One configured remote feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Short display name, e.g. `"REUTERS"`.
    pub name: String,

    /// Feed URL.
    pub url: String,

    #[serde(flatten)]
    pub style: SourceStyle,

    /// Items carry full description/content bodies rather than bare titles.
    #[serde(default)]
    pub full_content: bool,

    /// Stories from this source are never removed by age pruning.
    #[serde(default)]
    pub age_exempt: bool,
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>, style: SourceStyle) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            style,
            full_content: false,
            age_exempt: false,
        }
    }

    pub fn full_content(mut self, yes: bool) -> Self {
        self.full_content = yes;
        self
    }

    pub fn age_exempt(mut self, yes: bool) -> Self {
        self.age_exempt = yes;
        self
    }
}

// ---------------------------------------------------------------------------
// Reliability counters
// ---------------------------------------------------------------------------

/// Mutable per-source fetch statistics.
///
/// The counts describe the most recent batch that included the source. The
/// failure streak and last-fetch time survive across batches; the streak
/// drives the circuit breaker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// `<item>` blocks read from the stream.
    pub fetched: u32,
    pub accepted: u32,
    /// Items rejected because the same headline is already pooled for this source.
    pub duplicates: u32,
    /// Items rejected for capture, parse or validation problems.
    pub parse_errors: u32,
    /// Connection or HTTP status failures.
    pub transport_errors: u32,
    /// Consecutive failures; reset by the next accepted story.
    pub failure_streak: u32,
    pub last_fetch: Option<DateTime<Utc>>,
}

impl SourceStats {
    /// Zero the per-batch counts, keeping the streak and last-fetch time.
    pub fn reset_counts(&mut self) {
        self.fetched = 0;
        self.accepted = 0;
        self.duplicates = 0;
        self.parse_errors = 0;
        self.transport_errors = 0;
    }

    /// `true` when the streak is long enough to skip this source.
    pub fn circuit_open(&self, threshold: u32) -> bool {
        self.failure_streak > threshold
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered sources and their stats, indexed `0..len()`.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<Source>,
    stats: Vec<SourceStats>,
    batch_size: usize,
}

impl SourceRegistry {
    /// `batch_size` is clamped to at least one.
    pub fn new(sources: Vec<Source>, batch_size: usize) -> Self {
        let stats = vec![SourceStats::default(); sources.len()];
        Self {
            sources,
            stats,
            batch_size: batch_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Source> {
        self.sources.get(index)
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn stats(&self, index: usize) -> Option<&SourceStats> {
        self.stats.get(index)
    }

    pub fn stats_mut(&mut self, index: usize) -> Option<&mut SourceStats> {
        self.stats.get_mut(index)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches needed to cover every source.
    pub fn batch_count(&self) -> usize {
        self.sources.len().div_ceil(self.batch_size)
    }

    /// Source indices `[batch * K, batch * K + K)`, clipped to the registry.
    pub fn batch_range(&self, batch: usize) -> Range<usize> {
        let start = batch.saturating_mul(self.batch_size).min(self.sources.len());
        let end = start.saturating_add(self.batch_size).min(self.sources.len());
        start..end
    }

    pub fn is_age_exempt(&self, index: usize) -> bool {
        self.sources.get(index).is_some_and(|s| s.age_exempt)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> SourceStyle {
        SourceStyle {
            text: Palette::White,
            background: Palette::Red,
            title: Palette::Black,
        }
    }

    fn registry(n: usize, batch: usize) -> SourceRegistry {
        let sources = (0..n)
            .map(|i| Source::new(format!("S{i}"), format!("https://example.com/{i}"), style()))
            .collect();
        SourceRegistry::new(sources, batch)
    }

    #[test]
    fn palette_expands_to_full_range() {
        assert_eq!(Palette::White.rgb(), (255, 255, 255));
        assert_eq!(Palette::Black.rgb(), (0, 0, 0));
        assert_eq!(Palette::Red.rgb(), (255, 0, 0));
        assert_eq!(Palette::Blue.rgb(), (0, 0, 255));
    }

    #[test]
    fn batches_cover_every_source_once() {
        let reg = registry(14, 6);
        assert_eq!(reg.batch_count(), 3);
        assert_eq!(reg.batch_range(0), 0..6);
        assert_eq!(reg.batch_range(1), 6..12);
        assert_eq!(reg.batch_range(2), 12..14);
        assert!(reg.batch_range(3).is_empty());
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let reg = registry(3, 0);
        assert_eq!(reg.batch_size(), 1);
        assert_eq!(reg.batch_count(), 3);
    }

    #[test]
    fn reset_counts_keeps_streak() {
        let mut stats = SourceStats {
            fetched: 5,
            accepted: 2,
            duplicates: 1,
            parse_errors: 2,
            transport_errors: 1,
            failure_streak: 4,
            last_fetch: None,
        };
        stats.reset_counts();
        assert_eq!(stats.fetched, 0);
        assert_eq!(stats.parse_errors, 0);
        assert_eq!(stats.failure_streak, 4);
    }

    #[test]
    fn circuit_opens_above_threshold() {
        let mut stats = SourceStats::default();
        stats.failure_streak = 3;
        assert!(!stats.circuit_open(3));
        stats.failure_streak = 4;
        assert!(stats.circuit_open(3));
    }

    #[test]
    fn source_deserializes_from_toml_table() {
        let src: Source = toml::from_str(
            r#"
            name = "WIRE"
            url = "https://example.com/feed"
            text = "white"
            background = "darkred"
            title = "gold"
            full_content = true
            "#,
        )
        .unwrap();
        assert_eq!(src.style.background, Palette::DarkRed);
        assert!(src.full_content);
        assert!(!src.age_exempt);
    }
}
