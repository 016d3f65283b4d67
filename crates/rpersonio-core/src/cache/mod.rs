//! Per-run caching module.
//!
//! This module provides the `DayIdCache`, which maps calendar dates to the
//! attendance day identifiers the write endpoint is keyed by. It is filled a
//! whole month at a time and lives only as long as the owning service.

pub mod day_ids;

pub use day_ids::{month_window, AttendanceDaySource, DayIdCache, DayIdEntry};
