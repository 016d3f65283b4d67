use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Datelike, Months, NaiveDate};
use tracing::debug;

use crate::api::ApiError;
use crate::models::period::new_id;
use crate::models::AttendanceCalendarDay;

/// Read path the cache fills itself from.
#[async_trait]
pub trait AttendanceDaySource: Send + Sync {
    /// Attendance days the server knows for `[start, end]`.
    async fn attendance_days(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceCalendarDay>, ApiError>;
}

/// What is known about one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayIdEntry {
    /// Identifier the server returned
    Server(String),
    /// Identifier generated locally for a day the server never created
    Minted(String),
    /// Looked up, the server has no day for this date
    Undefined,
}

impl DayIdEntry {
    pub fn id(&self) -> Option<&str> {
        match self {
            DayIdEntry::Server(id) | DayIdEntry::Minted(id) => Some(id),
            DayIdEntry::Undefined => None,
        }
    }
}

/// Date to day identifier map for one run.
///
/// A date missing from the map has not been looked up yet. Lookups fill the
/// whole month around the date with a single calendar query, and dates the
/// server has no day for get an identifier minted on first use. Minted
/// identifiers are kept even when the write using them fails, so a retry
/// reuses them.
///
/// All mutation goes through `&mut self`: lookup and lazy fill run as one
/// critical section. Share a cache between tasks only behind a mutex.
#[derive(Debug, Default)]
pub struct DayIdCache {
    entries: HashMap<NaiveDate, DayIdEntry>,
}

impl DayIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DayIdEntry> {
        self.entries.get(&date)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identifier for `date`, querying its month on a miss and minting one
    /// if the server has none.
    pub async fn get_or_create<S>(&mut self, date: NaiveDate, source: &S) -> Result<String, ApiError>
    where
        S: AttendanceDaySource + ?Sized,
    {
        if !self.entries.contains_key(&date) {
            self.refresh_month(date, source).await?;
        }

        if let Some(id) = self.entries.get(&date).and_then(DayIdEntry::id) {
            return Ok(id.to_string());
        }

        let id = new_id();
        debug!(%date, id = %id, "Minting attendance day identifier");
        self.entries.insert(date, DayIdEntry::Minted(id.clone()));
        Ok(id)
    }

    /// Query the month containing `date` and record every day of it.
    pub async fn refresh_month<S>(&mut self, date: NaiveDate, source: &S) -> Result<(), ApiError>
    where
        S: AttendanceDaySource + ?Sized,
    {
        let (start, end) = month_window(date);
        let days = source.attendance_days(start, end).await?;

        let mut known = 0;
        for day in days {
            let day_date = day.attributes.day;
            if day_date < start || day_date > end || day.id.is_empty() {
                continue;
            }
            self.entries.insert(day_date, DayIdEntry::Server(day.id));
            known += 1;
        }

        for day_date in start.iter_days().take_while(|d| *d <= end) {
            self.entries.entry(day_date).or_insert(DayIdEntry::Undefined);
        }

        debug!(%start, %end, known, "Refreshed attendance day identifiers");
        Ok(())
    }
}

/// First and last day of the month containing `date`.
pub fn month_window(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date);
    (first, last)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::models::AttendanceCalendarDayAttributes;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("test date")
    }

    fn day(id: &str, on: &str) -> AttendanceCalendarDay {
        AttendanceCalendarDay {
            id: id.to_string(),
            attributes: AttendanceCalendarDayAttributes {
                break_min: 0,
                duration_min: 0,
                status: "empty".to_string(),
                day: date(on),
            },
        }
    }

    /// Serves a fixed set of days and records every queried window.
    #[derive(Default)]
    struct RecordingSource {
        days: Vec<AttendanceCalendarDay>,
        calls: Mutex<Vec<(NaiveDate, NaiveDate)>>,
        fail: bool,
    }

    impl RecordingSource {
        fn with_days(days: Vec<AttendanceCalendarDay>) -> Self {
            Self {
                days,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<(NaiveDate, NaiveDate)> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl AttendanceDaySource for RecordingSource {
        async fn attendance_days(
            &self,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<AttendanceCalendarDay>, ApiError> {
            self.calls.lock().expect("calls lock").push((start, end));
            if self.fail {
                return Err(ApiError::RemoteApi {
                    status: 503,
                    body: "maintenance".to_string(),
                });
            }
            Ok(self
                .days
                .iter()
                .filter(|d| d.attributes.day >= start && d.attributes.day <= end)
                .cloned()
                .collect())
        }
    }

    #[test]
    fn test_month_window() {
        assert_eq!(month_window(date("2023-01-18")), (date("2023-01-01"), date("2023-01-31")));
        assert_eq!(month_window(date("2024-02-10")), (date("2024-02-01"), date("2024-02-29")));
        assert_eq!(month_window(date("2023-12-31")), (date("2023-12-01"), date("2023-12-31")));
    }

    #[tokio::test]
    async fn test_returns_server_identifier() {
        let source = RecordingSource::with_days(vec![day("server-day", "2023-01-18")]);
        let mut cache = DayIdCache::new();

        let id = cache.get_or_create(date("2023-01-18"), &source).await.expect("lookup");
        assert_eq!(id, "server-day");
        assert_eq!(
            cache.get(date("2023-01-18")),
            Some(&DayIdEntry::Server("server-day".to_string()))
        );
        assert_eq!(source.calls(), vec![(date("2023-01-01"), date("2023-01-31"))]);
    }

    #[tokio::test]
    async fn test_one_query_per_month() {
        let source = RecordingSource::with_days(vec![
            day("a", "2023-01-02"),
            day("b", "2023-01-18"),
        ]);
        let mut cache = DayIdCache::new();

        for d in ["2023-01-02", "2023-01-18", "2023-01-25", "2023-01-31", "2023-01-01"] {
            cache.get_or_create(date(d), &source).await.expect("lookup");
        }
        assert_eq!(source.calls().len(), 1);

        // A different month costs exactly one more query
        cache.get_or_create(date("2023-02-01"), &source).await.expect("lookup");
        cache.get_or_create(date("2023-02-14"), &source).await.expect("lookup");
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_marks_missing_days_undefined() {
        let source = RecordingSource::with_days(vec![day("a", "2023-01-02")]);
        let mut cache = DayIdCache::new();
        cache.refresh_month(date("2023-01-15"), &source).await.expect("refresh");

        assert_eq!(cache.len(), 31);
        assert_eq!(cache.get(date("2023-01-03")), Some(&DayIdEntry::Undefined));
        assert!(cache.get(date("2023-02-01")).is_none());
    }

    #[tokio::test]
    async fn test_mint_is_idempotent() {
        let source = RecordingSource::default();
        let mut cache = DayIdCache::new();

        let first = cache.get_or_create(date("2023-01-20"), &source).await.expect("mint");
        let second = cache.get_or_create(date("2023-01-20"), &source).await.expect("reuse");

        assert_eq!(first, second);
        assert!(uuid::Uuid::parse_str(&first).is_ok());
        assert_eq!(cache.get(date("2023-01-20")), Some(&DayIdEntry::Minted(first)));
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_dates_get_distinct_mints() {
        let source = RecordingSource::default();
        let mut cache = DayIdCache::new();

        let a = cache.get_or_create(date("2023-01-20"), &source).await.expect("mint");
        let b = cache.get_or_create(date("2023-01-21"), &source).await.expect("mint");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_refresh_keeps_minted_identifier() {
        let source = RecordingSource::default();
        let mut cache = DayIdCache::new();

        let minted = cache.get_or_create(date("2023-01-20"), &source).await.expect("mint");
        cache.refresh_month(date("2023-01-01"), &source).await.expect("refresh");

        assert_eq!(cache.get(date("2023-01-20")), Some(&DayIdEntry::Minted(minted)));
    }

    #[tokio::test]
    async fn test_source_error_caches_nothing() {
        let source = RecordingSource {
            fail: true,
            ..Default::default()
        };
        let mut cache = DayIdCache::new();

        let result = cache.get_or_create(date("2023-01-20"), &source).await;
        assert!(matches!(result, Err(ApiError::RemoteApi { status: 503, .. })));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_ignores_days_outside_window() {
        // A sloppy server answer must not mark other months as looked up
        struct Sloppy;

        #[async_trait]
        impl AttendanceDaySource for Sloppy {
            async fn attendance_days(
                &self,
                _start: NaiveDate,
                _end: NaiveDate,
            ) -> Result<Vec<AttendanceCalendarDay>, ApiError> {
                Ok(vec![day("feb", "2023-02-01")])
            }
        }

        let mut cache = DayIdCache::new();
        cache.refresh_month(date("2023-01-10"), &Sloppy).await.expect("refresh");
        assert!(cache.get(date("2023-02-01")).is_none());
    }
}
