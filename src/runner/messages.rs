use crate::{
    config::TrackingConfig, ledger::storage::SaveReceipt, tracker::controller::TrackerSnapshot,
    utils::duration::TrackedDuration,
};

/// Commands the UI forwards into the tracking module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCommand {
    TogglePause,
    /// Save the session, optionally naming it at the same time.
    Save { title: Option<String> },
    SetTarget(String),
    SetTitle(String),
    Status,
    Quit,
}

/// What the tracking module reports back for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    Snapshot(TrackerSnapshot),
    Settings(TrackingConfig),
    Saved(SaveReceipt),
    /// A save needs a title. The user answers with another save carrying one.
    TitleRequired,
    SaveFailed(String),
    SettingsRejected(String),
    /// Already in the ledger for today under the configured title.
    SavedToday { title: String, total: TrackedDuration },
    Stopped { unsaved: TrackedDuration },
}
