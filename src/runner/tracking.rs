use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::ConfigStore,
    error::SaveError,
    ledger::storage::LedgerStorage,
    tracker::controller::TrackingController,
    utils::{clock::Clock, duration::TrackedDuration},
    window_api::ForegroundProbe,
};

use super::messages::{TrackerCommand, TrackerEvent};

/// Single owner of the [TrackingController]. Ticks, user commands and shutdown are handled one
/// at a time from the same loop, so the state machine is never entered concurrently.
pub struct TrackingModule<C: ConfigStore, L: LedgerStorage> {
    controller: TrackingController<C, L>,
    probe: Box<dyn ForegroundProbe>,
    commands: mpsc::Receiver<TrackerCommand>,
    events: mpsc::Sender<TrackerEvent>,
    shutdown: CancellationToken,
    tick_interval: Duration,
    time_provider: Box<dyn Clock>,
}

impl<C: ConfigStore, L: LedgerStorage> TrackingModule<C, L> {
    pub fn new(
        controller: TrackingController<C, L>,
        probe: Box<dyn ForegroundProbe>,
        commands: mpsc::Receiver<TrackerCommand>,
        events: mpsc::Sender<TrackerEvent>,
        shutdown: CancellationToken,
        tick_interval: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            controller,
            probe,
            commands,
            events,
            shutdown,
            tick_interval,
            time_provider,
        }
    }

    async fn emit(&self, event: TrackerEvent) -> Result<()> {
        debug!("Emitting {event:?}");
        self.events.send(event).await?;
        Ok(())
    }

    async fn tick(&mut self) -> Result<()> {
        let title = self.probe.foreground_title().unwrap_or_else(|e| {
            warn!("Couldn't read the foreground window, treating it as empty {e:?}");
            String::new()
        });
        let snapshot = self.controller.tick(&title);
        self.emit(TrackerEvent::Snapshot(snapshot)).await
    }

    async fn handle(&mut self, command: TrackerCommand) -> Result<()> {
        info!("Handling {command:?}");
        match command {
            TrackerCommand::TogglePause => {
                let snapshot = self.controller.toggle_pause();
                self.emit(TrackerEvent::Snapshot(snapshot)).await
            }
            TrackerCommand::Save { title } => {
                let event = match self.controller.save_session(title.as_deref()).await {
                    Ok(receipt) => TrackerEvent::Saved(receipt),
                    Err(SaveError::MissingTitle) => TrackerEvent::TitleRequired,
                    Err(e) => TrackerEvent::SaveFailed(e.to_string()),
                };
                self.emit(event).await?;
                self.emit(TrackerEvent::Snapshot(self.controller.snapshot())).await
            }
            TrackerCommand::SetTarget(pattern) => {
                let title = self.controller.config().session_title.clone();
                self.change_settings(&pattern, &title).await
            }
            TrackerCommand::SetTitle(title) => {
                let pattern = self.controller.config().target_pattern.clone();
                self.change_settings(&pattern, &title).await
            }
            TrackerCommand::Status => {
                self.emit(TrackerEvent::Settings(self.controller.config().clone()))
                    .await?;
                match self.controller.saved_today().await {
                    Ok(Some((title, total))) => {
                        self.emit(TrackerEvent::SavedToday { title, total }).await?
                    }
                    Ok(None) => (),
                    Err(e) => warn!("Couldn't read today's saved total {e:?}"),
                }
                self.emit(TrackerEvent::Snapshot(self.controller.snapshot())).await
            }
            TrackerCommand::Quit => {
                self.shutdown.cancel();
                Ok(())
            }
        }
    }

    async fn change_settings(&mut self, pattern: &str, title: &str) -> Result<()> {
        let event = match self.controller.change_settings(pattern, title) {
            Ok(config) => TrackerEvent::Settings(config.clone()),
            Err(e) => TrackerEvent::SettingsRejected(e.to_string()),
        };
        self.emit(event).await
    }

    async fn finish(self) -> Result<()> {
        let unsaved = self.controller.unsaved();
        if unsaved > TrackedDuration::ZERO {
            warn!("Stopping with {unsaved} of unsaved time");
        }
        // The renderer may already be gone during shutdown.
        let _ = self.events.send(TrackerEvent::Stopped { unsaved }).await;
        Ok(())
    }

    /// Executes the tracking event loop.
    pub async fn run(mut self) -> Result<()> {
        self.emit(TrackerEvent::Settings(self.controller.config().clone()))
            .await?;

        let mut commands_open = true;
        let mut tick_point = self.time_provider.instant();
        loop {
            self.tick().await?;

            // A slow save can leave the schedule behind, skip the missed ticks.
            tick_point = (tick_point + self.tick_interval).max(self.time_provider.instant());

            loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => {
                        return self.finish().await;
                    }
                    command = self.commands.recv(), if commands_open => match command {
                        Some(command) => self.handle(command).await?,
                        None => {
                            debug!("Command channel closed");
                            commands_open = false;
                        }
                    },
                    _ = self.time_provider.sleep_until(tick_point) => break,
                }
            }
        }
    }
}
