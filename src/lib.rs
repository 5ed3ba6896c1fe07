//! Incrementally copies Cold Turkey's per-domain browsing time into a Google Sheet.
//! Raw samples are summed into one row per local calendar day and domain, and only days that are
//! over get synced. A cursor file remembers the last synced day so re-runs never append twice.
//!

pub mod cli;
pub mod config;
pub mod cursor;
pub mod domain;
pub mod error;
pub mod sheets;
pub mod stats;
pub mod sync;
pub mod utils;
