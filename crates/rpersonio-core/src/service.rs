//! Attendance operations on top of the API client and the day-ID cache.
//!
//! Every operation checks the session first and fails with `NotLoggedIn`
//! before touching the network. Writes go through the `DayIdCache` owned by
//! the service, so one service instance should be used for a whole run.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError, HttpTransport, Transport};
use crate::auth::{Credentials, Session, SessionData};
use crate::cache::DayIdCache;
use crate::clock::{Clock, SystemClock};
use crate::models::{
    AttendanceCalendar, AttendanceDayUpdate, AttendancePeriod, NewWorkingTimePeriod,
    WorkingTimePeriod,
};

pub struct AttendanceService<T = HttpTransport> {
    client: ApiClient<T>,
    day_ids: DayIdCache,
    clock: Arc<dyn Clock>,
}

impl AttendanceService<HttpTransport> {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self::from_client(ApiClient::new(base_url)?))
    }
}

impl<T: Transport> AttendanceService<T> {
    pub fn from_client(client: ApiClient<T>) -> Self {
        Self {
            client,
            day_ids: DayIdCache::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    pub fn session(&self) -> &Session {
        self.client.session()
    }

    pub fn day_ids(&self) -> &DayIdCache {
        &self.day_ids
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<&SessionData, ApiError> {
        self.client.login(credentials).await
    }

    pub fn ensure_logged_in(&self) -> Result<&SessionData, ApiError> {
        self.client.session().ensure_logged_in()
    }

    /// Attendance calendar of any employee the session may see.
    pub async fn get_calendar(
        &self,
        employee_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AttendanceCalendar, ApiError> {
        self.ensure_logged_in()?;
        self.client.attendance_calendar(employee_id, start, end).await
    }

    /// Attendance calendar of the logged in employee.
    pub async fn get_my_calendar(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AttendanceCalendar, ApiError> {
        let employee_id = self.ensure_logged_in()?.employee_id;
        self.client.attendance_calendar(employee_id, start, end).await
    }

    /// Working time periods with all instants in local time.
    pub async fn get_working_time_periods(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<WorkingTimePeriod>, ApiError> {
        self.ensure_logged_in()?;
        let periods = self.client.working_time_periods(from, to).await?;
        debug!(count = periods.len(), "Fetched working time periods");
        Ok(periods
            .into_iter()
            .map(|p| p.localize(self.clock.as_ref()))
            .collect())
    }

    /// Replace the attendance periods of `date`.
    ///
    /// The day identifier comes from the cache, minted if the server has no
    /// day yet. A failed write leaves the minted identifier cached.
    pub async fn set_attendance(
        &mut self,
        date: NaiveDate,
        periods: &[AttendancePeriod],
    ) -> Result<(), ApiError> {
        let employee_id = self.ensure_logged_in()?.employee_id;
        let periods = periods
            .iter()
            .map(AttendancePeriod::normalize)
            .collect::<Result<Vec<_>, _>>()?;

        let day_id = self.day_ids.get_or_create(date, &self.client).await?;
        let update = AttendanceDayUpdate {
            employee_id,
            periods,
        };
        self.client.update_attendance_day(&day_id, &update).await?;

        info!(%date, day_id = %day_id, periods = update.periods.len(), "Attendance saved");
        Ok(())
    }

    /// Record one working time period from `from` to `to`.
    pub async fn set_working_time_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let employee_id = self.ensure_logged_in()?.employee_id;
        let record = NewWorkingTimePeriod::new(employee_id, from, to)?;

        let created = self
            .client
            .create_working_time_periods(std::slice::from_ref(&record))
            .await?;
        info!(count = created.len(), id = %record.id, "Working time period created");
        Ok(())
    }
}

impl<T> std::fmt::Debug for AttendanceService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceService")
            .field("client", &self.client)
            .field("day_ids", &self.day_ids)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
