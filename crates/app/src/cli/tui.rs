//! Ratatui-based full-screen menu
//!
//! Draws the shared [`MenuState`] and feeds it key presses. While a stimulus
//! plays, the loop keeps redrawing and polls the playback's completion
//! channel; only Esc (cancel) is accepted.

use crate::session::{ActivePlayback, Session};
use calibrate_core::domain::audio::{PlaybackBackend, PlaybackHandle};
use calibrate_core::domain::menu::{KeyInput, MenuEffect, MenuOption, MenuState};
use calibrate_core::domain::params::ParameterStore;
use crossterm::cursor::Show;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tracing::{debug, info};

// ============================================================================
// TuiController - manages the terminal and rendering
// ============================================================================

/// Owns the terminal for the lifetime of the menu
pub struct TuiController {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    pub menu: MenuState,
}

impl TuiController {
    /// Create a new TuiController and enter alternate screen mode.
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        io::stdout().execute(EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

        Ok(Self {
            terminal,
            menu: MenuState::new(),
        })
    }

    /// Wait up to `timeout` for a key press
    pub fn next_key(&self, timeout: Duration) -> io::Result<Option<KeyInput>> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                return Ok(key_input(&key));
            }
        }
        Ok(None)
    }

    /// Draw the current state to the terminal.
    pub fn draw(&mut self, params: &ParameterStore) -> io::Result<()> {
        let menu = &self.menu;
        self.terminal.draw(|frame| render_ui(frame, menu, params))?;
        Ok(())
    }

    /// Restore terminal to normal state.
    pub fn restore(&self) -> io::Result<()> {
        disable_raw_mode()?;
        io::stdout().execute(LeaveAlternateScreen)?;
        io::stdout().execute(Show)?;
        Ok(())
    }
}

impl Drop for TuiController {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Translate a terminal key event; releases and unknown keys are ignored
pub fn key_input(key: &KeyEvent) -> Option<KeyInput> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        // Raw mode swallows SIGINT, so Ctrl-C asks to quit instead
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyInput::Char('q'))
        }
        KeyCode::Char(c) => Some(KeyInput::Char(c)),
        KeyCode::Enter => Some(KeyInput::Enter),
        KeyCode::Backspace => Some(KeyInput::Backspace),
        KeyCode::Up => Some(KeyInput::Up),
        KeyCode::Down => Some(KeyInput::Down),
        KeyCode::Left => Some(KeyInput::Left),
        KeyCode::Right => Some(KeyInput::Right),
        KeyCode::Esc => Some(KeyInput::Esc),
        _ => None,
    }
}

/// Run the full-screen menu until the operator quits
pub fn run<B: PlaybackBackend>(session: &mut Session<B>, poll_interval: Duration) -> io::Result<()> {
    let mut tui = TuiController::new()?;
    let mut active: Option<ActivePlayback<B::Handle>> = None;
    info!("Full-screen menu started");

    loop {
        if let Some(outcome) = active.as_ref().and_then(|playback| playback.poll()) {
            if let Some(playback) = active.take() {
                debug!(?outcome, "Playback ended");
                tui.menu.finish_playback(playback.outcome_status(&outcome));
            }
        }

        tui.draw(&session.params)?;

        let Some(key) = tui.next_key(poll_interval)? else {
            continue;
        };

        match tui.menu.handle_key(key, &mut session.params) {
            MenuEffect::None => {}
            MenuEffect::Quit => break,
            MenuEffect::CancelPlayback => {
                if let Some(playback) = &active {
                    playback.handle.cancel();
                }
            }
            MenuEffect::Play(kind) => match session.start_playback(kind) {
                Ok(playback) => {
                    tui.menu.start_playback(playback.playing_status());
                    active = Some(playback);
                }
                Err(e) => tui.menu.set_status(e.to_string()),
            },
        }
    }

    if let Some(playback) = active.take() {
        playback.handle.cancel();
    }
    info!("Full-screen menu closed");
    tui.restore()
}

// ============================================================================
// Rendering functions
// ============================================================================

fn render_ui(frame: &mut Frame, menu: &MenuState, params: &ParameterStore) {
    let area = frame.area();
    frame.render_widget(Clear, area);

    let main_block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", menu.screen().title()))
        .border_style(Style::default().fg(Color::Cyan));
    let inner = main_block.inner(area);
    frame.render_widget(main_block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Options
            Constraint::Length(1), // Input line
            Constraint::Length(1), // Separator
            Constraint::Length(1), // Instructions
            Constraint::Length(1), // Status
        ])
        .split(inner);

    render_options(frame, chunks[0], menu, params);
    render_input(frame, chunks[1], menu);
    frame.render_widget(
        Paragraph::new("─".repeat(chunks[2].width as usize))
            .style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );
    frame.render_widget(
        Paragraph::new(menu.instructions()).style(Style::default().fg(Color::DarkGray)),
        chunks[3],
    );

    let status_style = if menu.is_playing() {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Yellow)
    };
    frame.render_widget(Paragraph::new(menu.status()).style(status_style), chunks[4]);

    if let Some(dialog) = menu.quit_dialog() {
        render_quit_overlay(frame, area, dialog.yes_selected);
    }
}

fn render_options(frame: &mut Frame, area: Rect, menu: &MenuState, params: &ParameterStore) {
    let items: Vec<ListItem> = menu
        .screen()
        .entries()
        .iter()
        .map(|entry| {
            let mut spans = vec![
                Span::styled(
                    format!(" {} ", entry.key),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!("{:<28}", entry.label())),
            ];
            if let Some(value) = entry.value_text(params) {
                spans.push(Span::styled(value, Style::default().fg(Color::White)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let highlight = if menu.is_playing() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().bg(Color::Rgb(40, 40, 60)).add_modifier(Modifier::BOLD)
    };
    let list = List::new(items).highlight_style(highlight).highlight_symbol("> ");
    let mut state = ListState::default().with_selected(Some(menu.selected()));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_input(frame: &mut Frame, area: Rect, menu: &MenuState) {
    let entry = menu.selected_entry();
    let line = match entry.option {
        MenuOption::EditNumeric(_) if !menu.is_playing() => Line::from(vec![
            Span::styled(
                format!(" {}: ", entry.label()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(menu.input().to_string(), Style::default().fg(Color::White)),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]),
        _ => Line::default(),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_quit_overlay(frame: &mut Frame, area: Rect, yes_selected: bool) {
    let overlay_width: u16 = 30;
    let overlay_height: u16 = 4;
    let overlay_area = Rect {
        x: area.x + (area.width.saturating_sub(overlay_width)) / 2,
        y: area.y + (area.height.saturating_sub(overlay_height)) / 2,
        width: overlay_width.min(area.width),
        height: overlay_height.min(area.height),
    };

    frame.render_widget(Clear, overlay_area);

    let button = |label: &'static str, selected: bool| {
        let style = if selected {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            Style::default().fg(Color::Yellow)
        };
        Span::styled(format!(" {} ", label), style)
    };

    let body = vec![
        Line::from(" Really quit?"),
        Line::from(vec![
            Span::raw("   "),
            button("Yes", yes_selected),
            Span::raw("   "),
            button("No", !yes_selected),
        ]),
    ];

    let dialog = Paragraph::new(body).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .style(Style::default().bg(Color::Rgb(40, 40, 40))),
    );
    frame.render_widget(dialog, overlay_area);
}
