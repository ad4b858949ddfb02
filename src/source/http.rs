//! HTTP transport for feed sources.
//!
//! Opening a feed returns a [`ByteStream`] rather than a parsed document: the
//! engine scans the body as it arrives and hangs up as soon as it has enough
//! stories, so most of a large feed is never downloaded.
//!
//! ## For contributors: adding a new transport
//!
//! 1. Implement [`FeedTransport`] for your type. `open()` must either fail
//!    fast with a [`TransportError`] or hand back a stream positioned at the
//!    first byte of the body.
//! 2. The returned stream must honor the `wait` passed to
//!    [`ByteStream::poll_byte`]; the scanner's stall detection relies on it.
//! 3. Wire it into the engine from `poll.rs`. Tests use an in-memory
//!    transport built on [`crate::scan::ScriptedStream`].

use std::io::{ErrorKind, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect;
use tracing::{debug, trace};

use crate::config::FetchConfig;
use crate::error::TransportError;
use crate::scan::{ByteStream, Poll};

/// Size of one read from the response body.
const CHUNK_SIZE: usize = 1024;

/// Chunks buffered between the reader thread and the scanner.
const CHANNEL_DEPTH: usize = 16;

/// Something that can open a feed URL as a live byte stream.
pub trait FeedTransport: Send {
    fn open(&self, url: &str) -> Result<Box<dyn ByteStream>, TransportError>;
}

/// Blocking HTTP(S) transport backed by `reqwest`.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client from the fetch settings.
    ///
    /// The whole-request timeout is a little longer than the per-source
    /// budget so the engine's own deadline always fires first.
    pub fn new(cfg: &FetchConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .redirect(redirect::Policy::limited(cfg.max_redirects))
            .danger_accept_invalid_certs(cfg.accept_invalid_certs)
            .timeout(cfg.source_timeout() + Duration::from_secs(5))
            .build()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        Ok(Self { client })
    }
}

impl FeedTransport for HttpTransport {
    fn open(&self, url: &str) -> Result<Box<dyn ByteStream>, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| TransportError::Connect {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(url, status = status.as_u16(), "feed opened");
        Ok(Box::new(ChannelStream::spawn(response)?))
    }
}

// ---------------------------------------------------------------------------
// Channel-backed stream
// ---------------------------------------------------------------------------

/// A [`ByteStream`] fed by a background thread that reads a blocking body.
///
/// Dropping the stream disconnects the channel; the reader thread notices on
/// its next send and exits, closing the underlying connection.
pub struct ChannelStream {
    rx: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
    closed: bool,
}

impl ChannelStream {
    pub fn spawn<R>(mut reader: R) -> Result<Self, TransportError>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(CHANNEL_DEPTH);

        thread::Builder::new()
            .name("feed-reader".into())
            .spawn(move || {
                let mut buf = [0u8; CHUNK_SIZE];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(buf[..n].to_vec()).is_err() {
                                trace!("stream dropped, reader exiting");
                                break;
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => {
                            debug!(error = %e, "body read failed");
                            break;
                        }
                    }
                }
            })
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        Ok(Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
            closed: false,
        })
    }
}

impl ByteStream for ChannelStream {
    fn poll_byte(&mut self, wait: Duration) -> Poll {
        if let Some(&byte) = self.chunk.get(self.pos) {
            self.pos += 1;
            return Poll::Data(byte);
        }
        if self.closed {
            return Poll::Closed;
        }
        match self.rx.recv_timeout(wait) {
            Ok(chunk) => {
                self.chunk = chunk;
                self.pos = 0;
                match self.chunk.first() {
                    Some(&byte) => {
                        self.pos = 1;
                        Poll::Data(byte)
                    }
                    None => Poll::Idle,
                }
            }
            Err(RecvTimeoutError::Timeout) => Poll::Idle,
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                Poll::Closed
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
    use std::io::Cursor;

    const WAIT: Duration = Duration::from_millis(500);

    fn drain(stream: &mut dyn ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            match stream.poll_byte(WAIT) {
                Poll::Data(b) => out.push(b),
                Poll::Idle => continue,
                Poll::Closed => return out,
            }
        }
    }

    /// Yields one byte, then blocks until dropped.
    struct SlowReader {
        sent: bool,
    }

    impl Read for SlowReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.sent {
                thread::sleep(Duration::from_millis(300));
                return Err(std::io::Error::new(ErrorKind::Other, "gave up"));
            }
            self.sent = true;
            buf[0] = b'x';
            Ok(1)
        }
    }

    #[test]
    fn channel_stream_delivers_body_in_order() {
        let body: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let mut stream = ChannelStream::spawn(Cursor::new(body.clone())).unwrap();
        assert_eq!(drain(&mut stream), body);
        assert_eq!(stream.poll_byte(WAIT), Poll::Closed);
    }

    #[test]
    fn channel_stream_reports_idle_while_reader_blocks() {
        let mut stream = ChannelStream::spawn(SlowReader { sent: false }).unwrap();
        assert_eq!(stream.poll_byte(WAIT), Poll::Data(b'x'));
        assert_eq!(stream.poll_byte(Duration::from_millis(20)), Poll::Idle);
        assert_eq!(drain(&mut stream), Vec::<u8>::new());
    }

    #[test]
    fn http_error_status_is_reported() {
        let mut server = mockito::Server::new();
        let _m = server.mock("GET", "/missing").with_status(404).create();

        let transport = HttpTransport::new(&FetchConfig::default()).unwrap();
        let url = format!("{}/missing", server.url());
        match transport.open(&url) {
            Err(TransportError::Status { status, .. }) => assert_eq!(status, 404),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("404 should not open"),
        }
    }

    #[test]
    fn http_body_is_streamed() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/feed")
            .with_status(200)
            .with_body("<rss><item>hi</item></rss>")
            .create();

        let transport = HttpTransport::new(&FetchConfig::default()).unwrap();
        let mut stream = transport.open(&format!("{}/feed", server.url())).unwrap();
        assert_eq!(drain(stream.as_mut()), b"<rss><item>hi</item></rss>".to_vec());
    }

    #[test]
    fn unreachable_host_is_a_connect_error() {
        let transport = HttpTransport::new(&FetchConfig::default()).unwrap();
        let err = transport.open("http://127.0.0.1:1/feed").err().unwrap();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
