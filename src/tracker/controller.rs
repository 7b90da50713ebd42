use tracing::{error, info, instrument, warn};

use crate::{
    config::{ConfigStore, TrackingConfig},
    error::{LedgerError, SaveError},
    ledger::{
        storage::{LedgerStorage, SaveReceipt},
        table::check_title,
    },
    utils::{clock::Clock, duration::TrackedDuration, time::date_to_ledger_key},
};

use super::state::{Tracker, TrackerMode, TrackerStatus};

/// What the UI needs to draw after any command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub status: TrackerStatus,
    pub elapsed: TrackedDuration,
}

/// Owns the [Tracker] and connects it to the clock, the persisted config and the ledger. All
/// commands the UI can issue go through here.
pub struct TrackingController<C: ConfigStore, L: LedgerStorage> {
    tracker: Tracker,
    config_store: C,
    ledger: L,
    clock: Box<dyn Clock>,
}

impl<C: ConfigStore, L: LedgerStorage> TrackingController<C, L> {
    pub fn new(config_store: C, ledger: L, clock: Box<dyn Clock>) -> Self {
        let tracker = Tracker::new(config_store.load());
        Self {
            tracker,
            config_store,
            ledger,
            clock,
        }
    }

    pub fn config(&self) -> &TrackingConfig {
        self.tracker.config()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            status: self.tracker.status(),
            elapsed: TrackedDuration::from_elapsed(self.tracker.elapsed(self.clock.time())),
        }
    }

    pub fn tick(&mut self, foreground_title: &str) -> TrackerSnapshot {
        let elapsed = self.tracker.tick(self.clock.time(), foreground_title);
        TrackerSnapshot {
            status: self.tracker.status(),
            elapsed: TrackedDuration::from_elapsed(elapsed),
        }
    }

    pub fn toggle_pause(&mut self) -> TrackerSnapshot {
        self.tracker.toggle_pause(self.clock.time());
        self.snapshot()
    }

    /// Replaces target and title and persists them. A failed write is logged, the new settings
    /// stay in effect for this run. A title that can't name a ledger column is refused and
    /// nothing changes.
    #[instrument(skip(self))]
    pub fn change_settings(
        &mut self,
        target_pattern: &str,
        session_title: &str,
    ) -> Result<&TrackingConfig, SaveError> {
        if !session_title.trim().is_empty() {
            check_title(session_title)?;
        }
        self.tracker.set_target(target_pattern);
        self.tracker.set_title(session_title);
        self.persist_config();
        info!("Settings changed to {}", self.tracker.config());
        Ok(self.tracker.config())
    }

    fn persist_config(&self) {
        if let Err(e) = self.config_store.save(self.tracker.config()) {
            error!("Failed to persist config {e:?}");
        }
    }

    /// Saves the tracked total under today's date.
    ///
    /// `title` is a title supplied together with this save. It becomes the configured title once
    /// it passes [check_title]. With neither a supplied nor a configured title the call fails
    /// with [SaveError::MissingTitle] and nothing changes, the caller is expected to ask for one
    /// and call again. On any failure the total and the running session are kept so the save can
    /// be retried.
    #[instrument(skip(self))]
    pub async fn save_session(&mut self, title: Option<&str>) -> Result<SaveReceipt, SaveError> {
        let supplied = title.map(str::trim).filter(|v| !v.is_empty());
        let configured = self.tracker.config().title().map(str::to_string);
        let title = match (supplied, configured) {
            (Some(title), configured) => {
                let title = check_title(title)?;
                if configured.as_deref() != Some(title) {
                    self.tracker.set_title(title);
                    self.persist_config();
                }
                title.to_string()
            }
            (None, Some(title)) => title,
            (None, None) => {
                warn!("Save requested without a title");
                return Err(SaveError::MissingTitle);
            }
        };

        let now = self.clock.time();
        let was_active = matches!(self.tracker.mode(), TrackerMode::Active { .. });
        let total = TrackedDuration::from_elapsed(self.tracker.finalize(now));
        let date = self.clock.today();

        match self.ledger.record_session(date, &title, total).await {
            Ok(receipt) => {
                self.tracker.reset();
                Ok(receipt)
            }
            Err(e) => {
                error!("Failed to save session, keeping {total} in memory: {e:?}");
                if was_active {
                    self.tracker.resume_at(now);
                }
                Err(e)
            }
        }
    }

    /// What the ledger already holds for today under the configured title. `None` when there is
    /// no title or no readable cell.
    pub async fn saved_today(&self) -> Result<Option<(String, TrackedDuration)>, LedgerError> {
        let Some(title) = self.tracker.config().title() else {
            return Ok(None);
        };
        let table = self.ledger.load().await?;
        let key = date_to_ledger_key(self.clock.today());
        let saved = table
            .cell(&key, title)
            .and_then(|cell| cell.trim().parse::<TrackedDuration>().ok());
        Ok(saved.map(|total| (title.to_string(), total)))
    }

    /// Time tracked since the last save that would be lost on exit.
    pub fn unsaved(&self) -> TrackedDuration {
        self.snapshot().elapsed
    }
}
