//! The ingestion engine: per-source fetch state machine and refresh cycle.
//!
//! A [`TickerEngine`] owns everything that changes while the ticker runs:
//! the source registry with its stats, the story pool and the playback
//! queue. It is driven from a single thread. A refresh walks one batch of
//! sources in order:
//!
//! 1. Check the network link, reconnecting once if needed. A link that stays
//!    down aborts the cycle and, after `max_link_failures` cycles in a row,
//!    ends the engine with [`EngineError::LinkLost`].
//! 2. Drop the batch's previous stories, plus any placeholders.
//! 3. Fetch each source (see [`TickerEngine::fetch_source`]).
//! 4. Prune stories older than the age window, sparing age-exempt sources.
//! 5. Insert placeholders if nothing is left, then reshuffle the queue.
//!
//! ## For contributors
//!
//! Item problems never surface as errors. Each one becomes a [`Rejection`],
//! is counted in the source's [`SourceStats`], and the loop moves on to the
//! next `<item>`. Only the network link going away for good is fatal.

use std::ops::Range;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{EngineError, ScanError};
use crate::extract::extract_value;
use crate::playback::PlaybackQueue;
use crate::pool::StoryPool;
use crate::sanitize::{clean_url, sanitize, sanitize_markup, strip_cdata};
use crate::scan::{capture_until, find_token, ByteStream, ScanLimits};
use crate::source::{FeedTransport, Source, SourceRegistry, SourceStats, SourceStyle, Story};
use crate::system::{Heartbeat, LinkMonitor, MemoryProbe, SystemMemory, TcpProbe};
use crate::validate::{
    check_url, format_display_time, is_acceptable_headline, is_placeholder_only, pub_date_epoch,
    UrlRejection, INVALID_TIMESTAMP, MIN_HEADLINE_LEN,
};

const ITEM_OPEN: &[u8] = b"<item>";
const ITEM_CLOSE: &[u8] = b"</item>";

/// Stories shown when a cycle leaves the pool empty.
pub const PLACEHOLDER_HEADLINES: [&str; 2] = [
    "SYSTEM: NO NEWS DATA AVAILABLE. WAITING FOR SYNC...",
    "CHECKING NETWORK CONNECTION...",
];

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a single feed item did not become a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("item body not captured: {0}")]
    Capture(ScanError),
    #[error("item has neither title nor description")]
    NoTitle,
    #[error("bad link: {0}")]
    Url(UrlRejection),
    #[error("headline too short")]
    TooShort,
    #[error("headline already pooled for this source")]
    Duplicate,
    #[error("headline looks like boilerplate or clickbait")]
    Filtered,
    #[error("missing or invalid publish date")]
    BadDate,
}

impl Rejection {
    /// Add this rejection to the matching counter.
    fn record(self, stats: &mut SourceStats) {
        match self {
            Rejection::Duplicate => stats.duplicates += 1,
            _ => stats.parse_errors += 1,
        }
        stats.failure_streak = stats.failure_streak.saturating_add(1);
    }
}

/// What ended a source's item loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The per-source story limit was reached.
    Limit,
    /// The feed had no more items.
    Exhausted,
    /// Looking for the next item timed out or stalled.
    Stream(ScanError),
    /// The per-source wall-clock budget ran out.
    Budget,
    /// Too many items in a row were rejected.
    Rejections,
    LowMemory,
    PoolFull,
}

/// Result of one [`TickerEngine::fetch_source`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Skipped because its failure streak opened the circuit.
    CircuitOpen,
    /// Skipped because free memory was below the floor.
    LowMemory,
    /// Skipped because the pool was already full.
    PoolFull,
    /// Connection or HTTP status failure.
    TransportFailed,
    Fetched { accepted: usize, stop: StopReason },
}

/// Summary of one [`TickerEngine::refresh`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub batch: usize,
    pub sources: Range<usize>,
    /// The link was down and the cycle was abandoned.
    pub link_down: bool,
    /// Stories dropped before fetching, placeholders included.
    pub removed: usize,
    pub accepted: usize,
    pub pruned: usize,
    /// The pool ended empty and placeholders were inserted.
    pub placeholders: bool,
    pub outcomes: Vec<(usize, SourceOutcome)>,
}

/// Immutable copy of what the display needs, taken between refreshes.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub stories: Vec<Story>,
    pub sources: Vec<Source>,
    pub last_sync_failed: bool,
    pub failure_count: u32,
    pub taken_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct TickerEngine {
    config: Config,
    registry: SourceRegistry,
    pool: StoryPool,
    queue: PlaybackQueue,
    transport: Box<dyn FeedTransport>,
    link: Box<dyn LinkMonitor>,
    memory: Box<dyn MemoryProbe>,
    heartbeat: Heartbeat,
    last_sync_failed: bool,
    link_failures: u32,
}

impl TickerEngine {
    /// Build an engine that probes the real network link and host memory.
    pub fn new(config: Config, transport: Box<dyn FeedTransport>) -> Self {
        let registry = SourceRegistry::new(config.resolved_sources(), config.pool.batch_size);
        let link = Box::new(TcpProbe::new(config.health.probe_addr.clone()));
        Self {
            pool: StoryPool::new(config.pool.max_size),
            registry,
            queue: PlaybackQueue::new(),
            transport,
            link,
            memory: Box::new(SystemMemory::new()),
            heartbeat: Heartbeat::new(),
            last_sync_failed: false,
            link_failures: 0,
            config,
        }
    }

    pub fn with_link(mut self, link: Box<dyn LinkMonitor>) -> Self {
        self.link = link;
        self
    }

    pub fn with_memory(mut self, memory: Box<dyn MemoryProbe>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_queue(mut self, queue: PlaybackQueue) -> Self {
        self.queue = queue;
        self
    }

    // -- accessors ---------------------------------------------------------

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &StoryPool {
        &self.pool
    }

    pub fn story(&self, index: usize) -> Option<&Story> {
        self.pool.get(index)
    }

    pub fn style(&self, source: usize) -> Option<SourceStyle> {
        self.registry.get(source).map(|s| s.style)
    }

    pub fn stats(&self, source: usize) -> Option<&SourceStats> {
        self.registry.stats(source)
    }

    /// `true` if the latest refresh hit a transport failure, a dead link or
    /// an empty pool.
    pub fn last_sync_failed(&self) -> bool {
        self.last_sync_failed
    }

    /// Consecutive refresh cycles abandoned because the link was down.
    pub fn failure_count(&self) -> u32 {
        self.link_failures
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            stories: self.pool.as_slice().to_vec(),
            sources: self.registry.sources().to_vec(),
            last_sync_failed: self.last_sync_failed,
            failure_count: self.link_failures,
            taken_at: Utc::now(),
        }
    }

    // -- playback ----------------------------------------------------------

    /// Draw the next story index, avoiding sources in `forbidden`.
    pub fn next_story(&mut self, forbidden: &[usize]) -> usize {
        self.queue.next(self.pool.as_slice(), forbidden)
    }

    pub fn reset_playback_queue(&mut self) {
        self.queue.reset(self.pool.len());
    }

    // -- refresh cycle -----------------------------------------------------

    /// Run one ingestion cycle for the sources of `batch`.
    pub fn refresh(&mut self, batch: usize) -> Result<RefreshReport, EngineError> {
        self.heartbeat.kick();
        self.last_sync_failed = false;

        let range = self.registry.batch_range(batch);
        let mut report = RefreshReport {
            batch,
            sources: range.clone(),
            link_down: false,
            removed: 0,
            accepted: 0,
            pruned: 0,
            placeholders: false,
            outcomes: Vec::with_capacity(range.len()),
        };
        info!(batch, first = range.start, end = range.end, "refresh starting");

        if !self.ensure_link() {
            self.last_sync_failed = true;
            self.link_failures += 1;
            report.link_down = true;
            if self.link_failures >= self.config.health.max_link_failures {
                error!(failures = self.link_failures, "network link lost, giving up");
                return Err(EngineError::LinkLost {
                    failures: self.link_failures,
                });
            }
            warn!(failures = self.link_failures, "link down, cycle abandoned");
            return Ok(report);
        }
        self.link_failures = 0;

        report.removed = self.pool.remove_synthetic() + self.pool.remove_sources(range.clone());

        for index in range {
            let outcome = self.fetch_source(index);
            match outcome {
                SourceOutcome::Fetched { accepted, .. } => report.accepted += accepted,
                SourceOutcome::TransportFailed => self.last_sync_failed = true,
                _ => {}
            }
            report.outcomes.push((index, outcome));
            self.heartbeat.kick();
        }

        let registry = &self.registry;
        report.pruned = self
            .pool
            .prune_by_age(self.config.pool.max_age_secs, |source| registry.is_age_exempt(source));

        let placeholders = self.placeholders();
        report.placeholders = self.pool.fill_if_empty(placeholders);
        if report.placeholders {
            warn!("pool empty after refresh, showing placeholders");
            self.last_sync_failed = true;
        }

        self.reset_playback_queue();
        info!(
            batch,
            accepted = report.accepted,
            pruned = report.pruned,
            pool = self.pool.len(),
            failed = self.last_sync_failed,
            "refresh complete"
        );
        Ok(report)
    }

    fn ensure_link(&mut self) -> bool {
        if self.link.is_up() {
            return true;
        }
        warn!("network link down, reconnecting");
        self.link
            .reconnect(self.config.health.reconnect_timeout(), &self.heartbeat)
    }

    fn placeholders(&self) -> Vec<Story> {
        let last = self.registry.len().saturating_sub(1);
        PLACEHOLDER_HEADLINES
            .iter()
            .enumerate()
            .map(|(i, text)| Story::placeholder(*text, i.min(last)))
            .collect()
    }

    // -- per-source state machine -------------------------------------------

    /// Fetch one source and append its accepted stories to the pool.
    ///
    /// A source whose failure streak exceeds the circuit threshold is skipped
    /// and its streak is wound back to the threshold, so it gets a single
    /// trial fetch next cycle.
    pub fn fetch_source(&mut self, index: usize) -> SourceOutcome {
        let Some(source) = self.registry.get(index).cloned() else {
            return SourceOutcome::Fetched {
                accepted: 0,
                stop: StopReason::Exhausted,
            };
        };
        let threshold = self.config.health.circuit_threshold;

        if let Some(stats) = self.registry.stats_mut(index) {
            stats.reset_counts();
            if stats.circuit_open(threshold) {
                warn!(source = %source.name, streak = stats.failure_streak, "circuit open, skipping");
                stats.failure_streak = threshold;
                return SourceOutcome::CircuitOpen;
            }
        }
        if memory_below(self.memory.as_mut(), self.config.health.memory_floor_bytes) {
            warn!(source = %source.name, "low memory, skipping");
            return SourceOutcome::LowMemory;
        }
        if self.pool.is_full() {
            debug!(source = %source.name, "pool full, skipping");
            return SourceOutcome::PoolFull;
        }

        self.heartbeat.kick();
        let started = Instant::now();
        let mut stream = match self.transport.open(&source.url) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(source = %source.name, error = %e, "fetch failed");
                if let Some(stats) = self.registry.stats_mut(index) {
                    stats.transport_errors += 1;
                    stats.failure_streak = stats.failure_streak.saturating_add(1);
                    stats.last_fetch = Some(Utc::now());
                }
                return SourceOutcome::TransportFailed;
            }
        };

        let (accepted, stop) = self.read_items(index, &source, stream.as_mut(), started);

        if let Some(stats) = self.registry.stats_mut(index) {
            stats.last_fetch = Some(Utc::now());
            info!(
                source = %source.name,
                fetched = stats.fetched,
                accepted = stats.accepted,
                duplicates = stats.duplicates,
                parse_errors = stats.parse_errors,
                streak = stats.failure_streak,
                ?stop,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "source complete"
            );
        }
        SourceOutcome::Fetched { accepted, stop }
    }

    fn read_items(
        &mut self,
        index: usize,
        source: &Source,
        stream: &mut dyn ByteStream,
        started: Instant,
    ) -> (usize, StopReason) {
        let fetch = &self.config.fetch;
        let budget = fetch.source_timeout();
        let max_len = if source.full_content {
            fetch.full_item_max_len
        } else {
            fetch.item_max_len
        };
        let limit = fetch.per_source_limit;
        let max_rejections = fetch.max_consecutive_rejections;
        let abort_floor = self.config.health.memory_abort_floor_bytes;

        let mut accepted = 0usize;
        let mut rejections_in_a_row = 0u32;

        loop {
            if accepted >= limit {
                return (accepted, StopReason::Limit);
            }
            let Some(remaining) = budget.checked_sub(started.elapsed()).filter(|d| !d.is_zero())
            else {
                warn!(source = %source.name, "source fetch budget spent");
                return (accepted, StopReason::Budget);
            };

            let find_limits = self.scan_limits(fetch.token_timeout(), remaining, fetch.find_stall_polls);
            match find_token(stream, ITEM_OPEN, &find_limits, &self.heartbeat) {
                Ok(()) => {}
                Err(ScanError::Closed) => return (accepted, StopReason::Exhausted),
                Err(e) => return (accepted, StopReason::Stream(e)),
            }
            if let Some(stats) = self.registry.stats_mut(index) {
                stats.fetched += 1;
            }

            let Some(remaining) = budget.checked_sub(started.elapsed()).filter(|d| !d.is_zero())
            else {
                warn!(source = %source.name, "source fetch budget spent before item body");
                return (accepted, StopReason::Budget);
            };
            let capture_limits =
                self.scan_limits(fetch.item_timeout(), remaining, fetch.capture_stall_polls);
            let verdict = capture_until(stream, ITEM_CLOSE, max_len, &capture_limits, &self.heartbeat)
                .map_err(Rejection::Capture)
                .and_then(|capture| self.evaluate_item(index, source, &capture.text));

            match verdict {
                Ok(story) => {
                    debug!(source = %source.name, headline = %story.headline, "accepted");
                    if self.pool.push(story).is_err() {
                        return (accepted, StopReason::PoolFull);
                    }
                    accepted += 1;
                    rejections_in_a_row = 0;
                    if let Some(stats) = self.registry.stats_mut(index) {
                        stats.accepted += 1;
                        stats.failure_streak = 0;
                    }
                    if self.pool.is_full() {
                        return (accepted, StopReason::PoolFull);
                    }
                }
                Err(rejection) => {
                    debug!(source = %source.name, %rejection, "rejected");
                    if let Some(stats) = self.registry.stats_mut(index) {
                        rejection.record(stats);
                    }
                    rejections_in_a_row += 1;
                    if rejections_in_a_row >= max_rejections {
                        warn!(source = %source.name, rejections_in_a_row, "too many rejections, aborting source");
                        return (accepted, StopReason::Rejections);
                    }
                }
            }

            if memory_below(self.memory.as_mut(), abort_floor) {
                warn!(source = %source.name, "memory low mid-fetch, aborting source");
                return (accepted, StopReason::LowMemory);
            }
            self.heartbeat.kick();
        }
    }

    fn scan_limits(&self, timeout: Duration, remaining: Duration, stall_polls: u32) -> ScanLimits {
        ScanLimits {
            timeout: timeout.min(remaining),
            poll_wait: self.config.fetch.poll_wait(),
            stall_polls,
        }
    }

    /// Turn a captured `<item>` body into a story, or say why not.
    fn evaluate_item(&self, index: usize, source: &Source, fragment: &str) -> Result<Story, Rejection> {
        let max_len = self.config.pool.max_headline_len;

        let mut description = String::new();
        if source.full_content {
            description = sanitize_markup(
                extract_value(fragment, "<description>", "</description>"),
                max_len,
            );
            if is_placeholder_only(&description) {
                let content = extract_value(fragment, "<content:encoded>", "</content:encoded>");
                let content = sanitize_markup(
                    truncate_at_boundary(content, self.config.fetch.content_max_len),
                    max_len,
                );
                if !content.is_empty() {
                    description = content;
                }
            }
        }

        let mut headline = sanitize(extract_value(fragment, "<title>", "</title>"), max_len);
        if headline.is_empty() {
            headline = description;
        }
        if headline.is_empty() {
            return Err(Rejection::NoTitle);
        }

        let url = check_url(&clean_url(extract_value(fragment, "<link>", "</link>")))
            .map_err(Rejection::Url)?;
        if headline.len() < MIN_HEADLINE_LEN {
            return Err(Rejection::TooShort);
        }
        if self.pool.contains_headline(index, &headline) {
            return Err(Rejection::Duplicate);
        }
        if !is_acceptable_headline(&headline) {
            return Err(Rejection::Filtered);
        }

        let date = strip_cdata(extract_value(fragment, "<pubDate>", "</pubDate>"));
        let timestamp = pub_date_epoch(&date);
        if timestamp == INVALID_TIMESTAMP {
            return Err(Rejection::BadDate);
        }

        Ok(Story {
            headline,
            url,
            timestamp,
            time_str: format_display_time(timestamp, self.config.display.utc_offset_hours),
            source: index,
            synthetic: false,
        })
    }
}

/// `false` when the host cannot report free memory.
fn memory_below(memory: &mut dyn MemoryProbe, floor: u64) -> bool {
    memory.available_bytes().is_some_and(|free| free < floor)
}

/// Longest prefix of `text` that is at most `max_len` bytes and ends on a
/// character boundary.
fn truncate_at_boundary(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
