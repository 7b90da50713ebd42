//! Keeps a running total of the time you spend in one application, decided by the title of the
//! focused window, and saves it into a per-day ledger with a column per activity.
//!

pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod ledger;
pub mod runner;
pub mod tracker;
pub mod utils;
pub mod window_api;
