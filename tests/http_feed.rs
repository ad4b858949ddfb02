//! End-to-end ingestion over real HTTP: feeds generated with the `rss` crate,
//! served by a local mock server, streamed through `HttpTransport` into the
//! engine's pool.

use chrono::{Duration as ChronoDuration, Utc};
use rss::{ChannelBuilder, ItemBuilder};
use ticker_feed::engine::{SourceOutcome, StopReason};
use ticker_feed::source::{Palette, SourceStyle};
use ticker_feed::system::{MemoryProbe, TcpProbe};
use ticker_feed::{Config, EngineError, HttpTransport, Source, TickerEngine};

struct PlentyOfMemory;

impl MemoryProbe for PlentyOfMemory {
    fn available_bytes(&mut self) -> Option<u64> {
        Some(u64::MAX)
    }
}

fn style() -> SourceStyle {
    SourceStyle {
        text: Palette::White,
        background: Palette::Navy,
        title: Palette::Gold,
    }
}

/// RSS 2.0 document with one item per `(title, age_hours)` pair.
fn feed(items: &[(&str, i64)]) -> String {
    let items = items
        .iter()
        .enumerate()
        .map(|(i, (title, age_hours))| {
            let published = Utc::now() - ChronoDuration::hours(*age_hours);
            ItemBuilder::default()
                .title(Some(title.to_string()))
                .link(Some(format!("https://news.example.com/story/{i}")))
                .description(Some(format!("Summary for story {i}.")))
                .pub_date(Some(published.to_rfc2822()))
                .build()
        })
        .collect::<Vec<_>>();
    ChannelBuilder::default()
        .title("Example Wire")
        .link("https://news.example.com")
        .description("Test feed")
        .items(items)
        .build()
        .to_string()
}

fn config_for(server: &mockito::Server, paths: &[&str]) -> Config {
    let mut config = Config::default();
    config.sources = paths
        .iter()
        .enumerate()
        .map(|(i, path)| Source::new(format!("WIRE {i}"), format!("{}{path}", server.url()), style()))
        .collect();
    config.health.probe_addr = server.host_with_port();
    config
}

fn build_engine(config: Config) -> TickerEngine {
    let transport = HttpTransport::new(&config.fetch).unwrap();
    let link = TcpProbe::new(config.health.probe_addr.clone());
    TickerEngine::new(config, Box::new(transport))
        .with_link(Box::new(link))
        .with_memory(Box::new(PlentyOfMemory))
}

#[test]
fn stories_flow_from_http_feed_into_pool() {
    let mut server = mockito::Server::new();
    let _feed = server
        .mock("GET", "/world.xml")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(feed(&[
            ("BREAKING: Harbor Bridge Reopens After Six Months Of Repairs", 1),
            ("City Council Approves Budget For Public Transit Expansion", 2),
            ("Regional Rail Strike Enters Its Second Week Without Talks", 72),
        ]))
        .create();
    let _gone = server.mock("GET", "/gone.xml").with_status(404).create();

    let mut engine = build_engine(config_for(&server, &["/world.xml", "/gone.xml"]));
    let report = engine.refresh(0).unwrap();

    assert!(!report.link_down);
    assert_eq!(report.accepted, 3);
    assert_eq!(report.pruned, 1, "three-day-old story falls outside the age window");
    assert_eq!(
        report.outcomes,
        vec![
            (
                0,
                SourceOutcome::Fetched {
                    accepted: 3,
                    stop: StopReason::Exhausted
                }
            ),
            (1, SourceOutcome::TransportFailed),
        ]
    );

    let headlines: Vec<&str> = engine.pool().iter().map(|s| s.headline.as_str()).collect();
    assert_eq!(
        headlines,
        vec![
            "Harbor Bridge Reopens After Six Months Of Repairs",
            "City Council Approves Budget For Public Transit Expansion",
        ]
    );
    assert!(engine.pool().iter().all(|s| s.source == 0 && !s.synthetic));
    assert_eq!(engine.pool().get(0).unwrap().url, "https://news.example.com/story/0");

    assert!(engine.last_sync_failed());
    assert_eq!(engine.stats(1).unwrap().transport_errors, 1);
    assert_eq!(engine.stats(0).unwrap().accepted, 3);
}

#[test]
fn refreshing_again_replaces_the_batch() {
    let mut server = mockito::Server::new();
    let _feed = server
        .mock("GET", "/world.xml")
        .with_status(200)
        .with_body(feed(&[
            ("Harbor Bridge Reopens After Six Months Of Repairs", 1),
            ("Harbor Bridge Reopens After Six Months Of Repairs", 1),
            ("Museum Unveils Restored Collection Of Maritime Maps", 1),
        ]))
        .create();

    let mut engine = build_engine(config_for(&server, &["/world.xml"]));
    let first = engine.refresh(0).unwrap();
    assert_eq!(first.accepted, 2);
    assert_eq!(engine.stats(0).unwrap().duplicates, 1);

    let second = engine.refresh(0).unwrap();
    assert_eq!(second.removed, 2);
    assert_eq!(engine.pool().len(), 2);
    assert!(!engine.last_sync_failed());
}

#[test]
fn failing_sources_leave_placeholders() {
    let mut server = mockito::Server::new();
    let _down = server.mock("GET", "/down.xml").with_status(503).create();

    let mut engine = build_engine(config_for(&server, &["/down.xml"]));
    let report = engine.refresh(0).unwrap();

    assert!(report.placeholders);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.stories.len(), 2);
    assert!(snapshot.stories.iter().all(|s| s.synthetic));
    assert!(snapshot.last_sync_failed);
}

#[test]
fn unreachable_link_ends_the_engine() {
    let server = mockito::Server::new();
    let mut config = config_for(&server, &["/world.xml"]);
    config.health.probe_addr = "127.0.0.1:1".to_string();
    config.health.max_link_failures = 1;
    config.health.reconnect_timeout_ms = 0;
    let mut engine = build_engine(config);

    match engine.refresh(0) {
        Err(EngineError::LinkLost { failures }) => assert_eq!(failures, 1),
        other => panic!("expected LinkLost, got {other:?}"),
    }
}
