//! Background refresh driver.
//!
//! Runs the [`TickerEngine`] on a dedicated thread, refreshing one batch of
//! sources per interval and sending a [`Snapshot`] to the UI thread over an
//! [`mpsc`] channel after every batch.
//!
//! ## For contributors
//!
//! The driver is the engine's only owner, so nothing here needs a lock. The
//! UI never touches the engine; it works from the latest snapshot and keeps
//! its own playback queue. The very first cycle refreshes every batch so the
//! ticker starts with a full pool; after that batches rotate.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::engine::{Snapshot, TickerEngine};
use crate::error::EngineError;
use crate::system::Heartbeat;

/// Messages sent from the driver thread to the UI thread.
#[derive(Debug)]
pub enum PollMsg {
    /// A refresh of this batch has started.
    Refreshing { batch: usize },
    /// A refresh finished; this is the new pool.
    Snapshot(Snapshot),
    /// The engine gave up. No further messages follow.
    Fatal(EngineError),
}

/// Longest single sleep between heartbeat kicks while idle.
const IDLE_SLICE: Duration = Duration::from_secs(1);

/// Which batches each cycle refreshes.
#[derive(Debug, Clone)]
pub struct BatchSchedule {
    count: usize,
    next: usize,
    primed: bool,
}

impl BatchSchedule {
    pub fn new(count: usize) -> Self {
        Self {
            count: count.max(1),
            next: 0,
            primed: false,
        }
    }

    /// Every batch on the first call, then one batch per call in rotation.
    pub fn next_cycle(&mut self) -> Vec<usize> {
        if !self.primed {
            self.primed = true;
            return (0..self.count).collect();
        }
        let batch = self.next;
        self.next = (self.next + 1) % self.count;
        vec![batch]
    }
}

/// Spawn the driver thread.
///
/// Returns a receiver that the main loop should drain on every tick. The
/// thread stops when the receiver is dropped or the engine reports a fatal
/// error.
pub fn spawn(engine: TickerEngine, interval: Duration) -> mpsc::Receiver<PollMsg> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || run(engine, interval, tx));
    rx
}

fn run(mut engine: TickerEngine, interval: Duration, tx: mpsc::Sender<PollMsg>) {
    let mut schedule = BatchSchedule::new(engine.registry().batch_count());
    info!(
        sources = engine.registry().len(),
        batches = engine.registry().batch_count(),
        "driver started"
    );

    loop {
        for batch in schedule.next_cycle() {
            if tx.send(PollMsg::Refreshing { batch }).is_err() {
                return;
            }
            match engine.refresh(batch) {
                Ok(report) => debug!(batch, accepted = report.accepted, "batch done"),
                Err(e) => {
                    error!(error = %e, "engine stopped");
                    let _ = tx.send(PollMsg::Fatal(e));
                    return;
                }
            }
            // If the receiver is gone the main thread has exited.
            if tx.send(PollMsg::Snapshot(engine.snapshot())).is_err() {
                return;
            }
        }
        idle(engine.heartbeat(), interval);
    }
}

/// Sleep for `total`, kicking `heartbeat` at least once a second.
fn idle(heartbeat: &Heartbeat, total: Duration) {
    let deadline = Instant::now() + total;
    loop {
        heartbeat.kick();
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(IDLE_SLICE));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
