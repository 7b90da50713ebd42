//! Terminal front end of the tracker: turns typed lines into [TrackerCommand]s and draws
//! [TrackerEvent]s.

use std::io::Write;

use ansi_term::{Colour, Style};
use anyhow::{anyhow, Result};
use tokio::{io::AsyncBufRead, io::AsyncBufReadExt, sync::mpsc};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    runner::messages::{TrackerCommand, TrackerEvent},
    tracker::state::TrackerStatus,
};

pub const HELP: &str = "Commands: p (pause/resume), s [TITLE] (save), target PATTERN, always, \
                        title TITLE, status, q (quit)";

/// Parses one typed line. Blank lines are `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<TrackerCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "p" | "pause" | "resume" => TrackerCommand::TogglePause,
        "s" | "save" => TrackerCommand::Save {
            title: (!rest.is_empty()).then(|| rest.to_string()),
        },
        "target" if !rest.is_empty() => TrackerCommand::SetTarget(rest.to_string()),
        "target" => return Err(anyhow!("`target` needs a pattern, use `always` to track everything")),
        "always" => TrackerCommand::SetTarget(String::new()),
        "title" => TrackerCommand::SetTitle(rest.to_string()),
        "status" => TrackerCommand::Status,
        "q" | "quit" | "exit" => TrackerCommand::Quit,
        other => return Err(anyhow!("Unknown command {other:?}. {HELP}")),
    };
    Ok(Some(command))
}

/// Forwards commands typed into `input` until it ends or `shutdown` fires.
pub async fn read_commands(
    input: impl AsyncBufRead + Unpin,
    commands: mpsc::Sender<TrackerCommand>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut lines = LinesStream::new(input.lines());
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            line = lines.next() => line,
        };
        let Some(line) = line else {
            debug!("Input closed");
            return Ok(());
        };

        match parse_command(&line?) {
            Ok(Some(command)) => {
                let quit = command == TrackerCommand::Quit;
                if commands.send(command).await.is_err() || quit {
                    return Ok(());
                }
            }
            Ok(None) => (),
            Err(e) => println!("\n{e}"),
        }
    }
}

fn status_style(status: TrackerStatus) -> Style {
    match status {
        TrackerStatus::Tracking => Colour::Green.bold(),
        TrackerStatus::Paused => Style::new().dimmed(),
        TrackerStatus::PausedManual => Colour::Yellow.normal(),
    }
}

/// Writes one event. Snapshots redraw the current line, everything else gets its own line.
pub fn render_event(out: &mut impl Write, event: &TrackerEvent) -> std::io::Result<()> {
    match event {
        TrackerEvent::Snapshot(snapshot) => {
            let style = status_style(snapshot.status);
            write!(
                out,
                "\r{} {}",
                style.paint(format!("{:>10}", snapshot.elapsed.to_string())),
                style.paint(format!("{:<16}", snapshot.status.to_string())),
            )?;
        }
        TrackerEvent::Settings(config) => writeln!(out, "\n{config}")?,
        TrackerEvent::Saved(receipt) => writeln!(out, "\n{}", Colour::Green.paint(receipt.to_string()))?,
        TrackerEvent::TitleRequired => writeln!(
            out,
            "\n{}",
            Colour::Yellow.paint("Cannot save without a title, use `save TITLE`")
        )?,
        TrackerEvent::SaveFailed(reason) => writeln!(
            out,
            "\n{}",
            Colour::Red.paint(format!("Save failed, time is kept: {reason}"))
        )?,
        TrackerEvent::SettingsRejected(reason) => writeln!(
            out,
            "\n{}",
            Colour::Red.paint(format!("Settings unchanged: {reason}"))
        )?,
        TrackerEvent::SavedToday { title, total } => {
            writeln!(out, "\nSaved today under '{title}': {total}")?
        }
        TrackerEvent::Stopped { unsaved } if unsaved.seconds() > 0 => writeln!(
            out,
            "\n{}",
            Colour::Red.paint(format!("Stopped, {unsaved} was not saved"))
        )?,
        TrackerEvent::Stopped { .. } => writeln!(out, "\nStopped")?,
    }
    out.flush()
}

/// Draws events until every sender is gone.
pub async fn render_events(
    mut events: mpsc::Receiver<TrackerEvent>,
    mut out: impl Write,
) -> Result<()> {
    writeln!(out, "{HELP}")?;
    while let Some(event) = events.recv().await {
        render_event(&mut out, &event)?;
    }
    Ok(())
}
