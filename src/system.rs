//! Host collaborators the engine leans on: a liveness heartbeat, a free
//! memory probe, and a network link monitor.
//!
//! Each is a small seam so tests can swap in fixed answers.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sysinfo::System;
use tracing::{debug, error};

// ---------------------------------------------------------------------------
// Heartbeat (watchdog feed)
// ---------------------------------------------------------------------------

/// Liveness signal kicked by every long-running loop in the engine.
///
/// Cloning is cheap; all clones share the same counter, so a monitor thread
/// can watch what the ingestion thread kicks.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    inner: Arc<HeartbeatInner>,
}

#[derive(Debug)]
struct HeartbeatInner {
    origin: Instant,
    last_ms: AtomicU64,
    beats: AtomicU64,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HeartbeatInner {
                origin: Instant::now(),
                last_ms: AtomicU64::new(0),
                beats: AtomicU64::new(0),
            }),
        }
    }

    /// Record that the caller is still making progress.
    pub fn kick(&self) {
        let now = self.inner.origin.elapsed().as_millis() as u64;
        self.inner.last_ms.store(now, Ordering::Relaxed);
        self.inner.beats.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the most recent kick.
    pub fn since_last(&self) -> Duration {
        let now = self.inner.origin.elapsed().as_millis() as u64;
        let last = self.inner.last_ms.load(Ordering::Relaxed);
        Duration::from_millis(now.saturating_sub(last))
    }

    /// Total number of kicks so far.
    pub fn beats(&self) -> u64 {
        self.inner.beats.load(Ordering::Relaxed)
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a monitor thread that calls `on_stall` once if the heartbeat goes
/// quiet for longer than `limit`, then exits.
pub fn spawn_watchdog<F>(heartbeat: Heartbeat, limit: Duration, on_stall: F) -> thread::JoinHandle<()>
where
    F: FnOnce(Duration) + Send + 'static,
{
    let check_every = (limit / 4).max(Duration::from_millis(50));
    thread::spawn(move || loop {
        thread::sleep(check_every);
        let quiet = heartbeat.since_last();
        if quiet > limit {
            error!(quiet_ms = quiet.as_millis() as u64, "heartbeat stalled");
            on_stall(quiet);
            return;
        }
    })
}

// ---------------------------------------------------------------------------
// Free memory
// ---------------------------------------------------------------------------

/// Reports how much memory is available to the process.
pub trait MemoryProbe: Send {
    /// Available bytes, or `None` when the host cannot tell.
    fn available_bytes(&mut self) -> Option<u64>;
}

/// [`MemoryProbe`] backed by the operating system's memory statistics.
pub struct SystemMemory {
    sys: System,
}

impl SystemMemory {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl Default for SystemMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemory {
    fn available_bytes(&mut self) -> Option<u64> {
        self.sys.refresh_memory();
        match self.sys.available_memory() {
            0 => None,
            bytes => Some(bytes),
        }
    }
}

// ---------------------------------------------------------------------------
// Network link
// ---------------------------------------------------------------------------

/// Answers whether the network link is usable and tries to bring it back.
pub trait LinkMonitor: Send {
    fn is_up(&mut self) -> bool;

    /// Keep retrying [`is_up`](LinkMonitor::is_up) until it succeeds or
    /// `budget` runs out, kicking `heartbeat` between attempts.
    fn reconnect(&mut self, budget: Duration, heartbeat: &Heartbeat) -> bool {
        let deadline = Instant::now() + budget;
        loop {
            heartbeat.kick();
            if self.is_up() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(500));
        }
    }
}

/// [`LinkMonitor`] that treats the link as up when a TCP connection to a
/// well-known address succeeds.
pub struct TcpProbe {
    addr: String,
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(3),
        }
    }
}

impl LinkMonitor for TcpProbe {
    fn is_up(&mut self) -> bool {
        let addrs = match self.addr.to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!(addr = %self.addr, error = %e, "link probe could not resolve");
                return false;
            }
        };
        for addr in addrs {
            if TcpStream::connect_timeout(&addr, self.connect_timeout).is_ok() {
                return true;
            }
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct FlakyLink {
        answers: Vec<bool>,
    }

    impl LinkMonitor for FlakyLink {
        fn is_up(&mut self) -> bool {
            if self.answers.is_empty() {
                false
            } else {
                self.answers.remove(0)
            }
        }
    }

    #[test]
    fn kick_resets_quiet_time_and_counts() {
        let hb = Heartbeat::new();
        thread::sleep(Duration::from_millis(20));
        assert!(hb.since_last() >= Duration::from_millis(20));

        hb.kick();
        assert!(hb.since_last() < Duration::from_millis(20));
        assert_eq!(hb.beats(), 1);
    }

    #[test]
    fn clones_share_state() {
        let hb = Heartbeat::new();
        let other = hb.clone();
        other.kick();
        other.kick();
        assert_eq!(hb.beats(), 2);
    }

    #[test]
    fn watchdog_fires_when_heartbeat_goes_quiet() {
        let hb = Heartbeat::new();
        let (tx, rx) = mpsc::channel();
        let handle = spawn_watchdog(hb, Duration::from_millis(100), move |quiet| {
            let _ = tx.send(quiet);
        });

        let quiet = rx.recv_timeout(Duration::from_secs(5)).expect("watchdog fired");
        assert!(quiet > Duration::from_millis(100));
        handle.join().unwrap();
    }

    #[test]
    fn reconnect_succeeds_on_later_attempt() {
        let mut link = FlakyLink { answers: vec![false, true] };
        let hb = Heartbeat::new();
        assert!(link.reconnect(Duration::from_secs(5), &hb));
        assert!(hb.beats() >= 2);
    }

    #[test]
    fn reconnect_gives_up_after_budget() {
        let mut link = FlakyLink { answers: vec![] };
        let hb = Heartbeat::new();
        assert!(!link.reconnect(Duration::from_millis(10), &hb));
    }

    #[test]
    fn system_memory_reports_something_plausible() {
        let mut probe = SystemMemory::new();
        if let Some(bytes) = probe.available_bytes() {
            assert!(bytes > 0);
        }
    }
}
