use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{lenient, TIMESTAMP_FORMAT};
use crate::api::ApiError;
use crate::clock::Clock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    #[default]
    Work,
    Break,
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodType::Work => write!(f, "work"),
            PeriodType::Break => write!(f, "break"),
        }
    }
}

impl std::str::FromStr for PeriodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "work" => Ok(PeriodType::Work),
            "break" | "pause" => Ok(PeriodType::Break),
            other => Err(format!("unknown period type {other:?}, expected work or break")),
        }
    }
}

/// A period to write to an attendance day.
///
/// Missing fields are filled in by [`AttendancePeriod::normalize`]: a fresh
/// id, type Work, empty comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendancePeriod {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type", alias = "period_type")]
    pub period_type: Option<PeriodType>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub project_id: Option<i64>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AttendancePeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: None,
            period_type: None,
            comment: None,
            project_id: None,
            start,
            end,
        }
    }

    pub fn with_type(mut self, period_type: PeriodType) -> Self {
        self.period_type = Some(period_type);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_project(mut self, project_id: i64) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Wire form: whole-second UTC timestamps, defaults applied.
    pub fn normalize(&self) -> Result<AttendancePeriodPayload, ApiError> {
        if self.start > self.end {
            return Err(ApiError::InvalidPeriod(format!(
                "start {} is after end {}",
                self.start.to_rfc3339(),
                self.end.to_rfc3339()
            )));
        }

        Ok(AttendancePeriodPayload {
            id: self.id.clone().unwrap_or_else(new_id),
            period_type: self.period_type.unwrap_or_default(),
            comment: self.comment.clone().unwrap_or_default(),
            project_id: self.project_id,
            start: format_timestamp(self.start),
            end: format_timestamp(self.end),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendancePeriodPayload {
    pub id: String,
    pub period_type: PeriodType,
    pub comment: String,
    pub project_id: Option<i64>,
    pub start: String,
    pub end: String,
}

/// Body of `PUT /svc/attendance-api/v1/days/{day_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceDayUpdate {
    pub employee_id: i64,
    pub periods: Vec<AttendancePeriodPayload>,
}

/// Record posted to `/api/v1/attendances/periods`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkingTimePeriod {
    pub id: String,
    pub employee_id: i64,
    pub start: String,
    pub end: String,
    pub activity_id: Option<i64>,
    pub comment: String,
    pub project_id: Option<i64>,
}

impl NewWorkingTimePeriod {
    pub fn new(
        employee_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, ApiError> {
        if start > end {
            return Err(ApiError::InvalidPeriod(format!(
                "start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self {
            id: new_id(),
            employee_id,
            start: format_timestamp(start),
            end: format_timestamp(end),
            activity_id: None,
            comment: String::new(),
            project_id: None,
        })
    }
}

/// Record echoed back after creating working time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedPeriod {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

/// Period record from `GET /api/v1/attendances/periods`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingTimePeriod {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub attributes: WorkingTimeAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingTimeAttributes {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    #[serde(default)]
    pub legacy_break_min: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub comment: String,
    #[serde(default)]
    pub period_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<FixedOffset>>,
    #[serde(default, deserialize_with = "lenient::optional_i64")]
    pub employee_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::optional_i64")]
    pub created_by: Option<i64>,
    #[serde(default)]
    pub attendance_day_id: Option<String>,
}

impl WorkingTimePeriod {
    /// Re-express every instant in the clock's local offset.
    pub fn localize(mut self, clock: &dyn Clock) -> Self {
        let attrs = &mut self.attributes;
        attrs.start = clock.to_local(attrs.start);
        attrs.end = clock.to_local(attrs.end);
        attrs.created_at = attrs.created_at.map(|t| clock.to_local(t));
        attrs.updated_at = attrs.updated_at.map(|t| clock.to_local(t));
        self
    }
}

/// Random 128-bit identifier in the form the API uses.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Truncate to whole seconds and format as UTC.
pub(crate) fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.trunc_subsecs(0).format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::clock::FixedClock;

    fn instant(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("test timestamp")
            .with_timezone(&Utc)
    }

    #[test]
    fn test_normalize_truncates_to_whole_seconds() {
        let period = AttendancePeriod::new(
            instant("2023-01-18T13:00:00.750Z"),
            instant("2023-01-18T17:00:00Z"),
        );
        let payload = period.normalize().expect("valid period");
        assert_eq!(payload.start, "2023-01-18T13:00:00Z");
        assert_eq!(payload.end, "2023-01-18T17:00:00Z");
    }

    #[test]
    fn test_normalize_converts_offsets_to_utc() {
        let start = DateTime::parse_from_rfc3339("2023-01-18T14:00:00+01:00")
            .expect("offset timestamp")
            .with_timezone(&Utc);
        let payload = AttendancePeriod::new(start, start).normalize().expect("valid");
        assert_eq!(payload.start, "2023-01-18T13:00:00Z");
    }

    #[test]
    fn test_normalize_applies_defaults() {
        let period = AttendancePeriod::new(
            instant("2023-01-18T09:00:00Z"),
            instant("2023-01-18T12:00:00Z"),
        );
        let payload = period.normalize().expect("valid period");
        assert_eq!(payload.period_type, PeriodType::Work);
        assert_eq!(payload.comment, "");
        assert!(payload.project_id.is_none());
        assert!(Uuid::parse_str(&payload.id).is_ok());

        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["period_type"], "work");
    }

    #[test]
    fn test_normalize_keeps_given_fields() {
        let period = AttendancePeriod::new(
            instant("2023-01-18T12:00:00Z"),
            instant("2023-01-18T12:30:00Z"),
        )
        .with_type(PeriodType::Break)
        .with_comment("lunch")
        .with_project(7);
        let period = AttendancePeriod {
            id: Some("fixed-id".to_string()),
            ..period
        };
        let payload = period.normalize().expect("valid period");
        assert_eq!(payload.id, "fixed-id");
        assert_eq!(payload.period_type, PeriodType::Break);
        assert_eq!(payload.comment, "lunch");
        assert_eq!(payload.project_id, Some(7));
    }

    #[test]
    fn test_normalize_rejects_reversed_period() {
        let period = AttendancePeriod::new(
            instant("2023-01-18T17:00:00Z"),
            instant("2023-01-18T13:00:00Z"),
        );
        assert!(matches!(period.normalize(), Err(ApiError::InvalidPeriod(_))));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let period = AttendancePeriod::new(
            instant("2023-01-18T09:00:00Z"),
            instant("2023-01-18T10:00:00Z"),
        );
        let a = period.normalize().expect("valid");
        let b = period.normalize().expect("valid");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_period_type_from_str() {
        assert_eq!("work".parse::<PeriodType>(), Ok(PeriodType::Work));
        assert_eq!("Break".parse::<PeriodType>(), Ok(PeriodType::Break));
        assert!("nap".parse::<PeriodType>().is_err());
    }

    #[test]
    fn test_attendance_period_parses_minimal_json() {
        let period: AttendancePeriod = serde_json::from_str(
            r#"{"start": "2023-01-18T09:00:00+01:00", "end": "2023-01-18T12:00:00+01:00"}"#,
        )
        .expect("minimal period");
        assert!(period.period_type.is_none());
        assert_eq!(period.start, instant("2023-01-18T08:00:00Z"));
    }

    #[test]
    fn test_new_working_time_period_shape() {
        let record = NewWorkingTimePeriod::new(
            42,
            instant("2023-01-18T09:00:00.999Z"),
            instant("2023-01-18T17:00:00Z"),
        )
        .expect("valid");
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["employee_id"], 42);
        assert_eq!(json["start"], "2023-01-18T09:00:00Z");
        assert!(json["activity_id"].is_null());
        assert!(json["project_id"].is_null());
        assert_eq!(json["comment"], "");
    }

    #[test]
    fn test_working_time_period_localize() {
        let json = r#"{
            "id": "p-1",
            "type": "AttendancePeriod",
            "attributes": {
                "start": "2023-01-18T08:00:00Z",
                "end": "2023-01-18T16:00:00Z",
                "legacy_break_min": 30,
                "comment": null,
                "period_type": "work",
                "created_at": "2023-01-18T16:05:00Z",
                "updated_at": "2023-01-18T16:05:00Z",
                "employee_id": 991824,
                "created_by": 991824,
                "attendance_day_id": "d5bb4b32"
            }
        }"#;
        let period: WorkingTimePeriod = serde_json::from_str(json).expect("period");
        assert_eq!(period.attributes.comment, "");
        assert_eq!(period.attributes.employee_id, Some(991824));

        let plus_one = FixedOffset::east_opt(3600).expect("offset");
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2023, 1, 18, 12, 0, 0).unwrap(), plus_one);
        let local = period.clone().localize(&clock);

        assert_eq!(local.attributes.start.offset(), &plus_one);
        assert_eq!(local.attributes.start.to_rfc3339(), "2023-01-18T09:00:00+01:00");
        // Same instant, different offset
        assert_eq!(local.attributes.start, period.attributes.start);
    }
}
