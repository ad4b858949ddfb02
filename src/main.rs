//! ticker-feed: a terminal news ticker fed by streamed RSS sources.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────┐  PollMsg   ┌──────────┐  draw()  ┌──────────┐
//! │  poll.rs │ ─────────► │  app.rs  │ ───────► │  ui.rs   │
//! │ (thread) │  (channel) │ (state)  │          │ (render) │
//! └──────────┘            └──────────┘          └──────────┘
//!      │                       ▲
//!      │ refresh()             │ handle_key_event()
//! ┌──────────┐            ┌──────────┐
//! │ engine.rs│            │ input.rs │
//! └──────────┘            └──────────┘
//! ```
//!
//! * **library** (`ticker_feed`): the ingestion engine, story pool,
//!   playback queue and the driver thread that runs them.
//! * **`app`**: display state built from engine snapshots.
//! * **`ui`**: pure rendering of `App` state.
//! * **`input`**: maps key events to `App` mutations.
//! * **`main`**: wires everything together: parse args, load config, set up
//!   logging and the terminal, and run the event loop.

mod app;
mod input;
mod ui;

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use app::App;
use ticker_feed::poll::{self, PollMsg};
use ticker_feed::system::{spawn_watchdog, Heartbeat};
use ticker_feed::{Config, HttpTransport, TickerEngine};

#[derive(Parser, Debug)]
#[command(name = "ticker-feed", about = "Scrolling news ticker fed by RSS sources")]
struct Args {
    /// Path to a TOML config file (defaults to ./ticker.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error); RUST_LOG wins
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log destination; the terminal belongs to the ticker
    #[arg(long, value_name = "FILE", default_value = "ticker-feed.log")]
    log_file: PathBuf,

    /// Refresh every batch once, print the pool and exit
    #[arg(long)]
    once: bool,
}

// ---------------------------------------------------------------------------
// Terminal guard
// ---------------------------------------------------------------------------

/// Manages terminal raw-mode and alternate-screen lifetime via [`Drop`].
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Restore the terminal before printing a panic message.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

fn init_logging(args: &Args) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log_file)
        .with_context(|| format!("opening log file {}", args.log_file.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let config = Config::load(args.config.as_deref()).context("loading configuration")?;
    let transport = HttpTransport::new(&config.fetch).context("building HTTP client")?;
    let heartbeat = Heartbeat::new();
    let engine =
        TickerEngine::new(config.clone(), Box::new(transport)).with_heartbeat(heartbeat.clone());
    info!(sources = engine.registry().len(), "ticker starting");

    if args.once {
        return run_once(engine);
    }

    // -- watchdog and background refresh -----------------------------------
    let (stall_tx, stall_rx) = mpsc::channel();
    spawn_watchdog(heartbeat, config.health.watchdog(), move |quiet| {
        let _ = stall_tx.send(quiet);
    });
    let rx = poll::spawn(engine, config.display.refresh_interval());

    // -- terminal setup (Drop restores on exit or panic) ---------------------
    install_panic_hook();
    let mut guard = TerminalGuard::new()?;
    let mut app = App::new(
        config.display.rows,
        config.display.carousel(),
        config.display.refresh_interval(),
    );

    let result = event_loop(&mut guard, &mut app, &rx, &stall_rx);
    drop(guard);
    if let Err(e) = &result {
        error!(error = %e, "ticker stopped");
    }
    result
}

/// Runs at ~10 fps. Each iteration drains driver messages, advances the
/// carousel, renders, then polls the keyboard for up to one tick.
fn event_loop(
    guard: &mut TerminalGuard,
    app: &mut App,
    rx: &mpsc::Receiver<PollMsg>,
    stall_rx: &mpsc::Receiver<Duration>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);

    loop {
        loop {
            match rx.try_recv() {
                Ok(PollMsg::Refreshing { .. }) => app.updating = true,
                Ok(PollMsg::Snapshot(snapshot)) => app.apply_snapshot(snapshot),
                Ok(PollMsg::Fatal(e)) => return Err(e).context("refresh driver gave up"),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => bail!("refresh driver exited"),
            }
        }
        if let Ok(quiet) = stall_rx.try_recv() {
            bail!("refresh driver made no progress for {}s", quiet.as_secs());
        }

        let now = Instant::now();
        app.tick(now);
        guard.terminal.draw(|f| ui::draw(app, f, now))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                input::handle_key_event(app, key);
            }
        }

        if app.quit {
            return Ok(());
        }
    }
}

fn run_once(mut engine: TickerEngine) -> Result<()> {
    for batch in 0..engine.registry().batch_count() {
        let report = engine.refresh(batch)?;
        println!(
            "batch {batch}: {} accepted, {} pruned",
            report.accepted, report.pruned
        );
    }
    for story in engine.pool().iter() {
        let name = engine
            .registry()
            .get(story.source)
            .map_or("?", |s| s.name.as_str());
        println!("[{name}] {:>12} {}", story.time_str, story.headline);
    }
    if engine.last_sync_failed() {
        println!("last sync reported failures; see the log for details");
    }
    Ok(())
}
