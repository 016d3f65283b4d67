use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::lenient;

/// `{"data": ...}` wrapper used by the attendance calendar sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Data<T> {
    pub data: T,
}

/// Response of the attendance calendar endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttendanceCalendar {
    #[serde(default)]
    pub attendance_rights: HashMap<String, bool>,
    #[serde(default)]
    pub attendance_days: Data<Vec<AttendanceCalendarDay>>,
    /// Absence periods (vacation, sick leave) overlapping the window
    #[serde(default)]
    pub attendance_periods: Data<Vec<AttendanceCalendarAbsencePeriod>>,
    #[serde(default)]
    pub holidays: Data<Vec<AttendanceCalendarHoliday>>,
}

impl AttendanceCalendar {
    /// Drop days, holidays and absences outside `[start, end]`.
    ///
    /// The calendar endpoint pads to whole weeks. Absences are kept when they
    /// overlap the window; entries with unparsable dates are kept.
    pub fn retain_window(&mut self, start: NaiveDate, end: NaiveDate) {
        let in_window = |day: NaiveDate| day >= start && day <= end;
        self.attendance_days
            .data
            .retain(|d| in_window(d.attributes.day));
        self.holidays
            .data
            .retain(|h| h.date().map(in_window).unwrap_or(true));
        self.attendance_periods.data.retain(|p| {
            p.date_range()
                .map(|(first, last)| first <= end && last >= start)
                .unwrap_or(true)
        });
    }

    /// Attendance day for a date, if the server has one.
    pub fn day(&self, date: NaiveDate) -> Option<&AttendanceCalendarDay> {
        self.attendance_days
            .data
            .iter()
            .find(|d| d.attributes.day == date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceCalendarDay {
    /// Day identifier, e.g. "d5bb4b32-c499-4f79-a534-93481505bd60"
    pub id: String,
    pub attributes: AttendanceCalendarDayAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceCalendarDayAttributes {
    #[serde(default)]
    pub break_min: i64,
    #[serde(default)]
    pub duration_min: i64,
    /// e.g. "empty", "confirmed"
    #[serde(default)]
    pub status: String,
    pub day: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceCalendarAbsencePeriod {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    /// e.g. "Paid vacation"
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tracks_overtime: bool,
    /// "day" or "hour"
    #[serde(default)]
    pub measurement_unit: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub effective_duration_in_minutes: Option<i64>,
    #[serde(default)]
    pub half_day_start: bool,
    #[serde(default)]
    pub half_day_end: bool,
}

impl AttendanceCalendarAbsencePeriod {
    /// First and last calendar day of the absence.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = NaiveDate::parse_from_str(&self.start_date, super::DATE_FORMAT).ok()?;
        let last = NaiveDate::parse_from_str(&self.end_date, super::DATE_FORMAT).ok()?;
        Some((first, last))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceCalendarHoliday {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    /// e.g. "2. Weihnachtstag"
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub holiday_calendar_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub half_day: String,
    #[serde(default)]
    pub date: String,
}

impl AttendanceCalendarHoliday {
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, super::DATE_FORMAT).ok()
    }

    pub fn is_half_day(&self) -> bool {
        matches!(self.half_day.as_str(), "true" | "1")
    }
}
