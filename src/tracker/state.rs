use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument};

use crate::config::TrackingConfig;

use super::matcher::matches_target;

/// Where the tracker is. `Active` carries the start of the open session, so a start time exists
/// exactly when the tracker is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerMode {
    Active { since: DateTime<Utc> },
    /// Stopped because the foreground window doesn't match the target.
    PausedAuto,
    /// Stopped by the user. Only another toggle leaves this mode.
    PausedManual,
}

/// [TrackerMode] without the timestamp, for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    Tracking,
    Paused,
    PausedManual,
}

impl Display for TrackerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerStatus::Tracking => write!(f, "Tracking…"),
            TrackerStatus::Paused => write!(f, "Paused"),
            TrackerStatus::PausedManual => write!(f, "Paused (Manual)"),
        }
    }
}

/// Tracking state machine. It never reads the clock or the window itself, every operation is
/// handed the current time and the caller serializes access.
#[derive(Debug, Clone)]
pub struct Tracker {
    config: TrackingConfig,
    mode: TrackerMode,
    accumulated: Duration,
    last_title: String,
}

impl Tracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            mode: TrackerMode::PausedAuto,
            accumulated: Duration::zero(),
            last_title: String::new(),
        }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn mode(&self) -> TrackerMode {
        self.mode
    }

    pub fn status(&self) -> TrackerStatus {
        match self.mode {
            TrackerMode::Active { .. } => TrackerStatus::Tracking,
            TrackerMode::PausedAuto => TrackerStatus::Paused,
            TrackerMode::PausedManual => TrackerStatus::PausedManual,
        }
    }

    /// Time folded in from closed sessions only.
    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    /// Accumulated time plus the open session, if any. Nothing is committed.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        match self.mode {
            TrackerMode::Active { since } => self.accumulated + session_length(since, now),
            TrackerMode::PausedAuto | TrackerMode::PausedManual => self.accumulated,
        }
    }

    fn should_track(&self, title: &str) -> bool {
        self.mode != TrackerMode::PausedManual && matches_target(&self.config.target_pattern, title)
    }

    /// Closes the open session into the accumulated total and leaves the tracker in `next`.
    fn close_session(&mut self, now: DateTime<Utc>, next: TrackerMode) {
        if let TrackerMode::Active { since } = self.mode {
            let session = session_length(since, now);
            self.accumulated += session;
            info!("Closed session of {}s", session.num_seconds());
        }
        self.mode = next;
    }

    /// Periodic heartbeat. Starts or stops the session depending on the foreground title and
    /// returns the live total. A manual pause is never lifted here.
    pub fn tick(&mut self, now: DateTime<Utc>, foreground_title: &str) -> Duration {
        if self.last_title != foreground_title {
            self.last_title.clear();
            self.last_title.push_str(foreground_title);
        }

        let should_track = self.should_track(foreground_title);
        debug!("Tick with {foreground_title:?}, should track {should_track}");

        match self.mode {
            TrackerMode::PausedAuto if should_track => {
                info!("Started tracking on {foreground_title:?}");
                self.mode = TrackerMode::Active { since: now };
            }
            TrackerMode::Active { .. } if !should_track => {
                self.close_session(now, TrackerMode::PausedAuto);
            }
            _ => (),
        }

        self.elapsed(now)
    }

    /// Manual pause/resume. Resuming goes straight back to tracking when the last seen window
    /// matches, otherwise to an automatic pause.
    #[instrument(skip(self))]
    pub fn toggle_pause(&mut self, now: DateTime<Utc>) -> TrackerStatus {
        match self.mode {
            TrackerMode::PausedManual => {
                self.mode = TrackerMode::PausedAuto;
                if self.should_track(&self.last_title) {
                    self.mode = TrackerMode::Active { since: now };
                }
                info!("Resumed, now {}", self.status());
            }
            TrackerMode::Active { .. } | TrackerMode::PausedAuto => {
                self.close_session(now, TrackerMode::PausedManual);
                info!("Paused manually");
            }
        }
        self.status()
    }

    /// Folds the open session into the total and returns it. The total is kept, call
    /// [Tracker::reset] once it is safely stored.
    #[instrument(skip(self))]
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Duration {
        if let TrackerMode::Active { .. } = self.mode {
            self.close_session(now, TrackerMode::PausedAuto);
        }
        self.accumulated
    }

    /// Reopens a session at `now` after [Tracker::finalize] closed one whose total couldn't be
    /// stored. Does nothing unless the tracker is automatically paused.
    pub fn resume_at(&mut self, now: DateTime<Utc>) {
        if self.mode == TrackerMode::PausedAuto {
            debug!("Reopening session at {now}");
            self.mode = TrackerMode::Active { since: now };
        }
    }

    /// Discards the accumulated total. Only correct right after a successful save.
    pub fn reset(&mut self) {
        debug!("Resetting accumulated {}s", self.accumulated.num_seconds());
        self.accumulated = Duration::zero();
    }

    pub fn set_target(&mut self, pattern: &str) {
        self.config.target_pattern = pattern.trim().to_string();
    }

    pub fn set_title(&mut self, title: &str) {
        self.config.session_title = title.trim().to_string();
    }
}

/// A clock that went backwards contributes nothing.
fn session_length(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).max(Duration::zero())
}
