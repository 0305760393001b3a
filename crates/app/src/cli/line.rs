//! Line-based menu
//!
//! Prints the current screen, reads one option key per line, and prompts for
//! numeric values. Playback blocks until the stimulus has finished, polling
//! the handle at the configured interval.

use crate::session::Session;
use calibrate_core::domain::audio::{PlaybackBackend, PlaybackHandle, PlaybackOutcome};
use calibrate_core::domain::menu::{Action, MenuOption, Screen};
use calibrate_core::domain::params::ParamId;
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tracing::info;

/// Run the line-based menu until the operator quits or input ends
pub fn run<B, R, W>(
    session: &mut Session<B>,
    mut input: R,
    mut output: W,
    poll_interval: Duration,
) -> io::Result<()>
where
    B: PlaybackBackend,
    R: BufRead,
    W: Write,
{
    let mut screen = Screen::Main;
    info!("Line menu started");

    loop {
        print_screen(session, screen, &mut output)?;
        write!(output, "Select an option: ")?;
        output.flush()?;

        let Some(line) = read_line(&mut input)? else {
            break;
        };
        let Some(key) = line.trim().chars().next() else {
            continue;
        };

        if screen == Screen::Main && key == 'q' {
            break;
        }

        match screen.entry_for_key(key).map(|(_, entry)| entry.option) {
            Some(MenuOption::NavigateTo(next)) => screen = next,
            Some(MenuOption::Quit) => break,
            Some(MenuOption::EditNumeric(id)) => {
                if !edit_value(session, id, &mut input, &mut output)? {
                    break;
                }
            }
            Some(MenuOption::Invoke(Action::Play(kind))) => {
                let status = match session.start_playback(kind) {
                    Ok(playback) => {
                        writeln!(output, "{}", playback.playing_status())?;
                        output.flush()?;
                        playback.handle.wait_polling(poll_interval);
                        let outcome = playback.poll().unwrap_or(PlaybackOutcome::Finished);
                        playback.outcome_status(&outcome)
                    }
                    Err(e) => e.to_string(),
                };
                writeln!(output, "{}", status)?;
            }
            None => writeln!(output, "Unrecognized option: {}", key)?,
        }
    }

    info!("Line menu closed");
    Ok(())
}

fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

fn print_screen<B: PlaybackBackend, W: Write>(
    session: &Session<B>,
    screen: Screen,
    output: &mut W,
) -> io::Result<()> {
    writeln!(output)?;
    writeln!(output, "{}", screen.title())?;
    for entry in screen.entries() {
        match entry.value_text(&session.params) {
            Some(value) => writeln!(output, "  {}) {:<28} {}", entry.key, entry.label(), value)?,
            None => writeln!(output, "  {}) {}", entry.key, entry.label())?,
        }
    }
    Ok(())
}

/// Prompt for a new value; returns false when input ended
fn edit_value<B: PlaybackBackend, R: BufRead, W: Write>(
    session: &mut Session<B>,
    id: ParamId,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    let spec = id.spec();
    write!(
        output,
        "{} {} (blank = unchanged, d = default): ",
        spec.label,
        spec.format_value(session.params.get(id))
    )?;
    output.flush()?;

    let Some(line) = read_line(input)? else {
        return Ok(false);
    };
    let status = match line.trim() {
        "d" => session.params.apply_default(id),
        raw => session.params.apply(id, raw),
    };
    writeln!(output, "{}", status.message)?;
    Ok(true)
}
