//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from display state ([`App`]) and
//! input handling ([`crate::input`]).
//!
//! ## For contributors
//!
//! * The layout is a header line, a countdown gauge, one card per ticker row
//!   and a one-line key help footer.
//! * Card colors come from each source's [`Palette`] entries, converted to
//!   true-color RGB.

use std::time::{Duration, Instant};

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};
use ticker_feed::source::Palette;

use crate::app::App;

fn color(p: Palette) -> Color {
    let (r, g, b) = p.rgb();
    Color::Rgb(r, g, b)
}

/// Draw the complete UI for one frame.
pub fn draw(app: &App, frame: &mut Frame, now: Instant) {
    let [header_area, gauge_area, rows_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_header(app, frame, header_area);
    draw_countdown(app, frame, gauge_area, now);
    draw_rows(app, frame, rows_area);
    draw_footer(app, frame, footer_area);
}

fn draw_header(app: &App, frame: &mut Frame, area: Rect) {
    let style = if app.last_sync_failed && !app.updating {
        Style::default().fg(Color::White).bg(Color::Red)
    } else {
        Style::default().fg(Color::Black).bg(Color::Yellow)
    };
    let header = Paragraph::new(Line::from(Span::styled(
        format!(" {} ", app.header()),
        style.add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .style(style);
    frame.render_widget(header, area);
}

fn draw_countdown(app: &App, frame: &mut Frame, area: Rect, now: Instant) {
    let left = app.until_next_sync(now);
    let label = if app.updating {
        "syncing".to_string()
    } else {
        format!("next sync {}", mmss(left))
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::DarkGray))
        .ratio(app.countdown_ratio(now))
        .label(label);
    frame.render_widget(gauge, area);
}

fn mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn draw_rows(app: &App, frame: &mut Frame, area: Rect) {
    let areas = Layout::vertical(vec![Constraint::Fill(1); app.rows.len()]).split(area);

    for (row, card_area) in areas.iter().enumerate() {
        match app.row(row) {
            Some((story, source)) => {
                let (name, text, background, title) = match source {
                    Some(src) => (
                        src.name.as_str(),
                        color(src.style.text),
                        color(src.style.background),
                        color(src.style.title),
                    ),
                    None => ("", Color::White, Color::Black, Color::White),
                };
                let block = Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(title))
                    .title(Span::styled(
                        format!(" {name} "),
                        Style::default().fg(title).add_modifier(Modifier::BOLD),
                    ))
                    .title(Line::from(format!(" {} ", story.time_str)).right_aligned())
                    .style(Style::default().bg(background));
                let card = Paragraph::new(story.headline.as_str())
                    .style(Style::default().fg(text).bg(background))
                    .wrap(Wrap { trim: true })
                    .block(block);
                frame.render_widget(card, *card_area);
            }
            None => {
                let empty = Paragraph::new("waiting for stories")
                    .style(Style::default().fg(Color::DarkGray))
                    .block(Block::default().borders(Borders::ALL));
                frame.render_widget(empty, *card_area);
            }
        }
    }
}

fn draw_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(
            format!(" {} stories", app.stories.len()),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  q: quit  space/n: next"),
    ];
    if let Some(at) = app.synced_at {
        spans.push(Span::styled(
            format!("  synced {} UTC", at.format("%H:%M")),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if app.failure_count > 0 {
        spans.push(Span::styled(
            format!("  link failures: {}", app.failure_count),
            Style::default().fg(Color::Red),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
