//! Data models for Personio attendance entities.
//!
//! This module contains the request and response shapes used by the
//! attendance endpoints:
//!
//! - `AttendanceCalendar`: days, absence periods and holidays for a window
//! - `AttendancePeriod`: a Work or Break interval to write to a day
//! - `WorkingTimePeriod`: a period record as returned by the periods API

pub mod calendar;
pub mod period;

mod lenient;

pub use calendar::{
    AttendanceCalendar, AttendanceCalendarAbsencePeriod, AttendanceCalendarDay,
    AttendanceCalendarDayAttributes, AttendanceCalendarHoliday, Data,
};
pub use period::{
    AttendanceDayUpdate, AttendancePeriod, AttendancePeriodPayload, CreatedPeriod,
    NewWorkingTimePeriod, PeriodType, WorkingTimeAttributes, WorkingTimePeriod,
};

/// Date format used in query parameters
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Whole-second UTC format the write endpoints expect
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
