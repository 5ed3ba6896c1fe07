//! Raw Cold Turkey samples and their aggregation into per-day totals.

pub mod aggregation;
pub mod entities;
pub mod source;
