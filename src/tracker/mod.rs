//! Decides whether the user is in the tracked application and keeps the running total.
//!
//! [state::Tracker] is the pure state machine. [controller::TrackingController] wraps it with the
//! clock, the config store and the ledger and exposes the commands the UI layer issues.

pub mod controller;
pub mod matcher;
pub mod state;
