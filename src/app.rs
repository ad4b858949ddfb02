//! Ticker display state.
//!
//! The display works entirely from the latest [`Snapshot`] sent by the
//! driver. It keeps its own [`PlaybackQueue`] over the snapshot's stories and
//! shows a fixed number of rows, replacing one row per carousel tick with a
//! story whose source is not already on screen.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use ticker_feed::playback::PlaybackQueue;
use ticker_feed::{Snapshot, Source, Story};

pub struct App {
    pub stories: Vec<Story>,
    pub sources: Vec<Source>,
    /// Pool index shown in each row, `None` until the first snapshot.
    pub rows: Vec<Option<usize>>,
    queue: PlaybackQueue,
    /// Row replaced on the next carousel tick.
    pub(crate) next_row: usize,
    carousel: Duration,
    last_advance: Instant,
    refresh_interval: Duration,
    last_sync: Option<Instant>,
    /// Wall-clock time the engine took the latest snapshot.
    pub synced_at: Option<DateTime<Utc>>,
    pub updating: bool,
    pub last_sync_failed: bool,
    pub failure_count: u32,
    /// Whether the user has requested to quit.
    pub quit: bool,
}

impl App {
    pub fn new(rows: usize, carousel: Duration, refresh_interval: Duration) -> Self {
        Self::with_queue(rows, carousel, refresh_interval, PlaybackQueue::new())
    }

    pub fn with_queue(
        rows: usize,
        carousel: Duration,
        refresh_interval: Duration,
        queue: PlaybackQueue,
    ) -> Self {
        Self {
            stories: Vec::new(),
            sources: Vec::new(),
            rows: vec![None; rows.max(1)],
            queue,
            next_row: 0,
            carousel,
            last_advance: Instant::now(),
            refresh_interval,
            last_sync: None,
            synced_at: None,
            updating: true,
            last_sync_failed: false,
            failure_count: 0,
            quit: false,
        }
    }

    /// Replace the displayed pool and redeal every row.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.stories = snapshot.stories;
        self.sources = snapshot.sources;
        self.last_sync_failed = snapshot.last_sync_failed;
        self.failure_count = snapshot.failure_count;
        self.synced_at = Some(snapshot.taken_at);
        self.updating = false;
        self.last_sync = Some(Instant::now());

        self.queue.reset(self.stories.len());
        for slot in self.rows.iter_mut() {
            *slot = None;
        }
        if self.stories.is_empty() {
            return;
        }
        for row in 0..self.rows.len() {
            let forbidden = self.sources_on_screen(row);
            self.rows[row] = Some(self.queue.next(&self.stories, &forbidden));
        }
        self.next_row = 0;
        self.last_advance = Instant::now();
    }

    /// Sources shown in every row except `skip`.
    fn sources_on_screen(&self, skip: usize) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(row, _)| *row != skip)
            .filter_map(|(_, slot)| slot.and_then(|i| self.stories.get(i)))
            .map(|story| story.source)
            .collect()
    }

    /// Replace the next row in rotation.
    pub fn advance(&mut self) {
        self.last_advance = Instant::now();
        if self.stories.is_empty() {
            return;
        }
        let row = self.next_row;
        let forbidden = self.sources_on_screen(row);
        self.rows[row] = Some(self.queue.next(&self.stories, &forbidden));
        self.next_row = (row + 1) % self.rows.len();
    }

    /// Advance when the carousel interval has passed since the last change.
    pub fn tick(&mut self, now: Instant) {
        if now.duration_since(self.last_advance) >= self.carousel {
            self.advance();
        }
    }

    pub fn row(&self, row: usize) -> Option<(&Story, Option<&Source>)> {
        let story = self.stories.get((*self.rows.get(row)?)?)?;
        Some((story, self.sources.get(story.source)))
    }

    pub fn header(&self) -> &'static str {
        if self.updating {
            "UPDATING..."
        } else if self.last_sync_failed {
            "SYNC ERROR"
        } else {
            "NEWS TICKER"
        }
    }

    /// Time left until the next scheduled sync.
    pub fn until_next_sync(&self, now: Instant) -> Duration {
        match self.last_sync {
            Some(at) => self.refresh_interval.saturating_sub(now.duration_since(at)),
            None => Duration::ZERO,
        }
    }

    /// Fraction of the refresh interval still remaining, in `0.0..=1.0`.
    pub fn countdown_ratio(&self, now: Instant) -> f64 {
        if self.refresh_interval.is_zero() {
            return 0.0;
        }
        let left = self.until_next_sync(now).as_secs_f64() / self.refresh_interval.as_secs_f64();
        left.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ticker_feed::source::{Palette, SourceStyle};

    fn snapshot(sources: &[usize]) -> Snapshot {
        let source_count = sources.iter().max().map_or(1, |m| m + 1);
        Snapshot {
            stories: sources
                .iter()
                .enumerate()
                .map(|(i, &source)| Story {
                    headline: format!("Headline {i} from source {source}"),
                    url: format!("https://example.com/{i}"),
                    timestamp: 1_720_000_000,
                    time_str: "Wed 9:30 AM".to_string(),
                    source,
                    synthetic: false,
                })
                .collect(),
            sources: (0..source_count)
                .map(|i| {
                    Source::new(
                        format!("SRC {i}"),
                        format!("https://feeds.example.com/{i}"),
                        SourceStyle {
                            text: Palette::White,
                            background: Palette::DarkBlue,
                            title: Palette::Gold,
                        },
                    )
                })
                .collect(),
            last_sync_failed: false,
            failure_count: 0,
            taken_at: Utc::now(),
        }
    }

    fn app(rows: usize) -> App {
        App::with_queue(
            rows,
            Duration::from_secs(15),
            Duration::from_secs(900),
            PlaybackQueue::with_seed(7),
        )
    }

    fn visible_sources(app: &App) -> Vec<usize> {
        (0..app.rows.len())
            .filter_map(|r| app.row(r).map(|(s, _)| s.source))
            .collect()
    }

    // -- construction --------------------------------------------------------

    #[test]
    fn new_app_waits_for_first_snapshot() {
        let app = app(3);
        assert_eq!(app.header(), "UPDATING...");
        assert!(app.row(0).is_none());
        assert!(!app.quit);
    }

    // -- snapshots -----------------------------------------------------------

    #[test]
    fn snapshot_fills_rows_with_distinct_sources() {
        let mut app = app(3);
        app.apply_snapshot(snapshot(&[0, 0, 0, 1, 1, 2, 2, 3]));

        let mut shown = visible_sources(&app);
        assert_eq!(shown.len(), 3);
        shown.sort_unstable();
        shown.dedup();
        assert_eq!(shown.len(), 3, "rows should not repeat a source");
        assert_eq!(app.header(), "NEWS TICKER");
    }

    #[test]
    fn snapshot_time_is_kept() {
        let mut app = app(1);
        assert!(app.synced_at.is_none());
        let snap = snapshot(&[0]);
        let taken_at = snap.taken_at;
        app.apply_snapshot(snap);
        assert_eq!(app.synced_at, Some(taken_at));
    }

    #[test]
    fn failed_sync_shows_error_header() {
        let mut app = app(3);
        let mut snap = snapshot(&[0, 1]);
        snap.last_sync_failed = true;
        app.apply_snapshot(snap);
        assert_eq!(app.header(), "SYNC ERROR");

        app.updating = true;
        assert_eq!(app.header(), "UPDATING...");
    }

    #[test]
    fn empty_snapshot_clears_rows() {
        let mut app = app(2);
        app.apply_snapshot(snapshot(&[0, 1]));
        let mut empty = snapshot(&[0]);
        empty.stories.clear();
        app.apply_snapshot(empty);
        assert!(app.row(0).is_none());
        app.advance();
        assert!(app.row(0).is_none());
    }

    // -- carousel ------------------------------------------------------------

    #[test]
    fn advance_keeps_sources_distinct() {
        let mut app = app(3);
        app.apply_snapshot(snapshot(&[0, 0, 1, 1, 2, 2, 3, 3, 4, 4]));
        // Each on-screen source has at most one card left in the deck, so a
        // free source is always available while the deck holds three or more.
        for _ in 0..4 {
            app.advance();
            let mut shown = visible_sources(&app);
            shown.sort_unstable();
            shown.dedup();
            assert_eq!(shown.len(), 3);
        }
    }

    #[test]
    fn tick_waits_for_carousel_interval() {
        let mut app = app(2);
        app.apply_snapshot(snapshot(&[0, 1, 2, 3]));
        let start = app.last_advance;

        app.tick(start + Duration::from_secs(1));
        assert_eq!(app.next_row, 0);

        app.tick(start + Duration::from_secs(15));
        assert_eq!(app.next_row, 1);
    }

    // -- countdown -----------------------------------------------------------

    #[test]
    fn countdown_runs_from_full_to_empty() {
        let mut app = app(1);
        assert_eq!(app.countdown_ratio(Instant::now()), 0.0);

        app.apply_snapshot(snapshot(&[0]));
        let synced = app.last_sync.unwrap();
        assert!(app.countdown_ratio(synced) > 0.99);
        assert_eq!(app.countdown_ratio(synced + Duration::from_secs(450)), 0.5);
        assert_eq!(app.countdown_ratio(synced + Duration::from_secs(2000)), 0.0);
        assert_eq!(
            app.until_next_sync(synced + Duration::from_secs(300)),
            Duration::from_secs(600)
        );
    }
}
