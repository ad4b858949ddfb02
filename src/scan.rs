//! Bounded, timeout-guarded scanning of a live byte stream.
//!
//! The feed body is never buffered in full. Instead the engine walks it with
//! two primitives:
//!
//! * [`find_token`] consumes bytes until a literal (e.g. `<item>`) has been
//!   seen.
//! * [`capture_until`] collects bytes up to a closing literal (e.g.
//!   `</item>`), keeping at most `max_len` of them.
//!
//! Both give up on a wall-clock deadline or after a run of empty polls, and
//! both kick the [`Heartbeat`] so an outer watchdog never mistakes a slow
//! feed for a hung process.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::ScanError;
use crate::system::Heartbeat;

/// Kick the heartbeat at least this often while bytes keep flowing.
const KICK_EVERY: u32 = 64;

/// Result of one attempt to read a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    Data(u8),
    /// Nothing arrived within the wait window.
    Idle,
    /// The peer closed the stream; no more data will come.
    Closed,
}

/// A source of bytes that can be polled with a bounded wait.
pub trait ByteStream {
    /// Return the next byte, waiting at most `wait` for one to arrive.
    fn poll_byte(&mut self, wait: Duration) -> Poll;
}

/// Time and stall budgets for a single scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanLimits {
    /// Overall wall-clock budget.
    pub timeout: Duration,
    /// How long one poll may wait for data.
    pub poll_wait: Duration,
    /// Consecutive idle polls after which the peer counts as stalled.
    pub stall_polls: u32,
}

/// Bytes captured by [`capture_until`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub text: String,
    /// `true` when bytes beyond `max_len` were consumed and dropped.
    pub truncated: bool,
}

/// Consume `stream` until `token` has been matched as a contiguous run.
///
/// Matching is a simple prefix automaton: on a mismatch it restarts at the
/// current byte if that byte equals the first byte of `token`, otherwise at
/// zero.
pub fn find_token(
    stream: &mut dyn ByteStream,
    token: &[u8],
    limits: &ScanLimits,
    heartbeat: &Heartbeat,
) -> Result<(), ScanError> {
    if token.is_empty() {
        return Ok(());
    }

    let start = Instant::now();
    let mut matched = 0usize;
    let mut idle = 0u32;
    let mut iterations = 0u32;

    loop {
        if iterations % KICK_EVERY == 0 {
            heartbeat.kick();
        }
        iterations = iterations.wrapping_add(1);

        if start.elapsed() >= limits.timeout {
            debug!(token = %String::from_utf8_lossy(token), "token search timed out");
            return Err(ScanError::TimedOut);
        }

        match stream.poll_byte(limits.poll_wait) {
            Poll::Data(byte) => {
                idle = 0;
                if byte == token[matched] {
                    matched += 1;
                    if matched == token.len() {
                        return Ok(());
                    }
                } else {
                    matched = usize::from(byte == token[0]);
                }
            }
            Poll::Idle => {
                heartbeat.kick();
                idle += 1;
                if idle >= limits.stall_polls {
                    debug!(token = %String::from_utf8_lossy(token), idle, "stream stalled in token search");
                    return Err(ScanError::Stalled);
                }
            }
            Poll::Closed => return Err(ScanError::Closed),
        }
    }
}

/// Collect bytes until `terminator` is seen, returning them without the
/// terminator.
///
/// At most `max_len` bytes are kept; later bytes are still consumed so the
/// terminator can be found, and the capture is flagged as truncated. A scan
/// that ends without the terminator discards everything it read.
pub fn capture_until(
    stream: &mut dyn ByteStream,
    terminator: &[u8],
    max_len: usize,
    limits: &ScanLimits,
    heartbeat: &Heartbeat,
) -> Result<Capture, ScanError> {
    if terminator.is_empty() {
        return Ok(Capture {
            text: String::new(),
            truncated: false,
        });
    }

    let start = Instant::now();
    let mut captured: Vec<u8> = Vec::with_capacity(max_len.min(4096));
    let mut tail: VecDeque<u8> = VecDeque::with_capacity(terminator.len());
    let mut truncated = false;
    let mut idle = 0u32;
    let mut iterations = 0u32;

    loop {
        if iterations % KICK_EVERY == 0 {
            heartbeat.kick();
        }
        iterations = iterations.wrapping_add(1);

        if start.elapsed() >= limits.timeout {
            warn!(read = captured.len(), "capture timed out before closing tag");
            return Err(ScanError::TimedOut);
        }

        match stream.poll_byte(limits.poll_wait) {
            Poll::Data(byte) => {
                idle = 0;
                if captured.len() < max_len {
                    captured.push(byte);
                } else {
                    truncated = true;
                }

                tail.push_back(byte);
                if tail.len() > terminator.len() {
                    tail.pop_front();
                }

                if tail.len() == terminator.len() && tail.iter().eq(terminator.iter()) {
                    if captured.ends_with(terminator) {
                        captured.truncate(captured.len() - terminator.len());
                    } else if truncated {
                        // The cap may have cut through the terminator.
                        let partial = dangling_prefix(&captured, terminator);
                        captured.truncate(captured.len() - partial);
                    }
                    if truncated {
                        warn!(max_len, "capture truncated");
                    }
                    return Ok(Capture {
                        text: String::from_utf8_lossy(&captured).into_owned(),
                        truncated,
                    });
                }
            }
            Poll::Idle => {
                heartbeat.kick();
                idle += 1;
                if idle >= limits.stall_polls {
                    warn!(read = captured.len(), idle, "stream stalled before closing tag");
                    return Err(ScanError::Stalled);
                }
            }
            Poll::Closed => return Err(ScanError::Closed),
        }
    }
}

/// Length of the longest proper prefix of `terminator` that `captured` ends
/// with.
fn dangling_prefix(captured: &[u8], terminator: &[u8]) -> usize {
    (1..terminator.len())
        .rev()
        .find(|&n| captured.ends_with(&terminator[..n]))
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Scripted stream
// ---------------------------------------------------------------------------

/// One step of a [`ScriptedStream`].
#[derive(Debug, Clone)]
enum Step {
    Bytes(VecDeque<u8>),
    Idle(u32),
    /// Repeat a filler byte forever.
    Endless(u8),
    /// Report idle forever.
    Stall,
}

/// An in-memory [`ByteStream`] that plays back a fixed script of data,
/// idle polls and stalls, then closes.
///
/// Useful for replaying a captured feed body and for exercising the
/// timeout paths without a network.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStream {
    steps: VecDeque<Step>,
}

impl ScriptedStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream that yields `bytes` and then closes.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self::new().bytes(bytes)
    }

    pub fn bytes(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.steps.push_back(Step::Bytes(bytes.as_ref().iter().copied().collect()));
        self
    }

    /// Report `polls` idle polls in a row.
    pub fn idle(mut self, polls: u32) -> Self {
        self.steps.push_back(Step::Idle(polls));
        self
    }

    /// Yield `filler` forever; nothing after this step is reached.
    pub fn endless(mut self, filler: u8) -> Self {
        self.steps.push_back(Step::Endless(filler));
        self
    }

    /// Never produce data again; nothing after this step is reached.
    pub fn stall(mut self) -> Self {
        self.steps.push_back(Step::Stall);
        self
    }
}

impl ByteStream for ScriptedStream {
    fn poll_byte(&mut self, _wait: Duration) -> Poll {
        loop {
            let Some(step) = self.steps.front_mut() else {
                return Poll::Closed;
            };
            match step {
                Step::Bytes(bytes) => {
                    if let Some(byte) = bytes.pop_front() {
                        return Poll::Data(byte);
                    }
                    self.steps.pop_front();
                }
                Step::Idle(0) => {
                    self.steps.pop_front();
                }
                Step::Idle(n) => {
                    *n -= 1;
                    return Poll::Idle;
                }
                Step::Endless(filler) => return Poll::Data(*filler),
                Step::Stall => return Poll::Idle,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ScanLimits {
        ScanLimits {
            timeout: Duration::from_secs(2),
            poll_wait: Duration::from_millis(1),
            stall_polls: 3,
        }
    }

    // -- find_token ----------------------------------------------------------

    #[test]
    fn finds_token_and_stops_right_after_it() {
        let mut stream = ScriptedStream::from_bytes("<rss><channel><item><title>");
        let hb = Heartbeat::new();

        assert_eq!(find_token(&mut stream, b"<item>", &limits(), &hb), Ok(()));
        assert_eq!(stream.poll_byte(Duration::ZERO), Poll::Data(b'<'));
        assert_eq!(stream.poll_byte(Duration::ZERO), Poll::Data(b't'));
    }

    #[test]
    fn restarts_match_on_repeated_first_byte() {
        let mut stream = ScriptedStream::from_bytes("<<item>");
        assert_eq!(find_token(&mut stream, b"<item>", &limits(), &Heartbeat::new()), Ok(()));
    }

    #[test]
    fn partial_token_then_close_is_closed() {
        let mut stream = ScriptedStream::from_bytes("<ite");
        assert_eq!(
            find_token(&mut stream, b"<item>", &limits(), &Heartbeat::new()),
            Err(ScanError::Closed)
        );
    }

    #[test]
    fn tolerates_short_idle_gaps() {
        let mut stream = ScriptedStream::new().bytes("<it").idle(2).bytes("em>");
        assert_eq!(find_token(&mut stream, b"<item>", &limits(), &Heartbeat::new()), Ok(()));
    }

    #[test]
    fn consecutive_idle_polls_mean_stalled() {
        let mut stream = ScriptedStream::new().bytes("<it").idle(3).bytes("em>");
        assert_eq!(
            find_token(&mut stream, b"<item>", &limits(), &Heartbeat::new()),
            Err(ScanError::Stalled)
        );
    }

    #[test]
    fn endless_data_without_token_times_out() {
        let mut stream = ScriptedStream::new().endless(b'x');
        let limits = ScanLimits {
            timeout: Duration::from_millis(30),
            ..limits()
        };
        assert_eq!(
            find_token(&mut stream, b"<item>", &limits, &Heartbeat::new()),
            Err(ScanError::TimedOut)
        );
    }

    #[test]
    fn search_kicks_heartbeat() {
        let hb = Heartbeat::new();
        let mut stream = ScriptedStream::new().idle(2).bytes("<item>");
        find_token(&mut stream, b"<item>", &limits(), &hb).unwrap();
        assert!(hb.beats() >= 3);
    }

    // -- capture_until -------------------------------------------------------

    #[test]
    fn captures_body_without_terminator() {
        let mut stream = ScriptedStream::from_bytes("<title>Hi</title></item><item>");
        let cap = capture_until(&mut stream, b"</item>", 100, &limits(), &Heartbeat::new()).unwrap();
        assert_eq!(cap.text, "<title>Hi</title>");
        assert!(!cap.truncated);
        assert_eq!(stream.poll_byte(Duration::ZERO), Poll::Data(b'<'));
    }

    #[test]
    fn truncates_but_still_finds_terminator() {
        let mut stream = ScriptedStream::from_bytes("abcdefghij</item>rest");
        let cap = capture_until(&mut stream, b"</item>", 4, &limits(), &Heartbeat::new()).unwrap();
        assert_eq!(cap.text, "abcd");
        assert!(cap.truncated);
        assert_eq!(stream.poll_byte(Duration::ZERO), Poll::Data(b'r'));
    }

    #[test]
    fn cap_inside_terminator_drops_the_partial_tag() {
        let mut stream = ScriptedStream::from_bytes("abcdefgh</item>rest");
        let cap = capture_until(&mut stream, b"</item>", 11, &limits(), &Heartbeat::new()).unwrap();
        assert_eq!(cap.text, "abcdefgh");
        assert!(cap.truncated);
        assert_eq!(stream.poll_byte(Duration::ZERO), Poll::Data(b'r'));
    }

    #[test]
    fn dangling_prefix_lengths() {
        assert_eq!(dangling_prefix(b"abc</i", b"</item>"), 3);
        assert_eq!(dangling_prefix(b"abc<", b"</item>"), 1);
        assert_eq!(dangling_prefix(b"abc", b"</item>"), 0);
    }

    #[test]
    fn missing_terminator_on_close_is_an_error() {
        let mut stream = ScriptedStream::from_bytes("<title>never closed");
        assert_eq!(
            capture_until(&mut stream, b"</item>", 100, &limits(), &Heartbeat::new()),
            Err(ScanError::Closed)
        );
    }

    #[test]
    fn stalled_capture_is_an_error() {
        let mut stream = ScriptedStream::new().bytes("<title>half").stall();
        assert_eq!(
            capture_until(&mut stream, b"</item>", 100, &limits(), &Heartbeat::new()),
            Err(ScanError::Stalled)
        );
    }

    #[test]
    fn endless_capture_times_out() {
        let mut stream = ScriptedStream::new().endless(b'x');
        let limits = ScanLimits {
            timeout: Duration::from_millis(30),
            ..limits()
        };
        assert_eq!(
            capture_until(&mut stream, b"</item>", 10, &limits, &Heartbeat::new()),
            Err(ScanError::TimedOut)
        );
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let mut stream = ScriptedStream::from_bytes(b"ok\xffok</item>");
        let cap = capture_until(&mut stream, b"</item>", 100, &limits(), &Heartbeat::new()).unwrap();
        assert!(cap.text.starts_with("ok"));
        assert!(cap.text.ends_with("ok"));
    }
}
