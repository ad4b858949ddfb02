//! The bounded story pool and its aging rules.

use std::ops::Range;

use tracing::debug;

use crate::source::Story;

/// Insertion-ordered stories, never longer than its capacity.
#[derive(Debug, Clone)]
pub struct StoryPool {
    stories: Vec<Story>,
    capacity: usize,
}

impl StoryPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            stories: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.stories.len() >= self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&Story> {
        self.stories.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Story> {
        self.stories.iter()
    }

    pub fn as_slice(&self) -> &[Story] {
        &self.stories
    }

    /// Append `story`, handing it back if the pool is full.
    pub fn push(&mut self, story: Story) -> Result<(), Story> {
        if self.is_full() {
            return Err(story);
        }
        self.stories.push(story);
        Ok(())
    }

    /// `true` if `source` already owns a story with exactly this headline.
    pub fn contains_headline(&self, source: usize, headline: &str) -> bool {
        self.stories
            .iter()
            .any(|s| s.source == source && s.headline == headline)
    }

    /// Drop every story owned by a source in `sources`. Returns how many went.
    pub fn remove_sources(&mut self, sources: Range<usize>) -> usize {
        let before = self.stories.len();
        self.stories.retain(|s| !sources.contains(&s.source));
        before - self.stories.len()
    }

    /// Drop the "no data" stand-ins left by an earlier empty cycle.
    pub fn remove_synthetic(&mut self) -> usize {
        let before = self.stories.len();
        self.stories.retain(|s| !s.synthetic);
        before - self.stories.len()
    }

    /// Largest timestamp in the pool, if any story is present.
    pub fn newest_timestamp(&self) -> Option<i64> {
        self.stories.iter().map(|s| s.timestamp).max()
    }

    /// Remove stories older than `newest - max_age`, sparing exempt sources.
    ///
    /// Returns the number of stories removed.
    pub fn prune_by_age<F>(&mut self, max_age: i64, is_exempt: F) -> usize
    where
        F: Fn(usize) -> bool,
    {
        let Some(newest) = self.newest_timestamp() else {
            return 0;
        };
        let cutoff = newest.saturating_sub(max_age);
        let before = self.stories.len();
        self.stories
            .retain(|s| s.timestamp >= cutoff || is_exempt(s.source));
        let removed = before - self.stories.len();
        if removed > 0 {
            debug!(removed, cutoff, "age pruning");
        }
        removed
    }

    /// Insert `placeholders` if the pool is empty. Returns `true` if it was.
    pub fn fill_if_empty(&mut self, placeholders: impl IntoIterator<Item = Story>) -> bool {
        if !self.stories.is_empty() {
            return false;
        }
        for story in placeholders {
            if self.push(story).is_err() {
                break;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
