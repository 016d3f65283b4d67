//! API client for Personio's attendance endpoints.
//!
//! This module provides the `ApiClient` struct, which performs the browser
//! login handshake, keeps the resulting session, and makes the authenticated
//! requests for calendars and attendance periods.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::session::{classify_login_response, LoginOutcome};
use crate::auth::{Credentials, Session, SessionData};
use crate::cache::AttendanceDaySource;
use crate::models::{
    AttendanceCalendar, AttendanceCalendarDay, AttendanceDayUpdate, CreatedPeriod,
    NewWorkingTimePeriod, WorkingTimePeriod, DATE_FORMAT,
};

use super::transport::{ApiRequest, HttpTransport, Transport};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/login/index";

const CALENDAR_PATH: &str = "/svc/attendance-bff/attendance-calendar";

const PERIODS_PATH: &str = "/api/v1/attendances/periods";

const DAYS_PATH: &str = "/svc/attendance-api/v1/days";

/// Laravel session cookie set by the login
const SESSION_COOKIE: &str = "personio_session";

/// Cookie holding the URL-encoded XSRF token
const XSRF_COOKIE: &str = "XSRF-TOKEN";

/// Header the XSRF token is echoed back in on writes
const XSRF_HEADER: &str = "X-XSRF-TOKEN";

/// API client for one Personio instance.
pub struct ApiClient<T = HttpTransport> {
    transport: T,
    session: Session,
    employee_id_override: Option<i64>,
}

impl ApiClient<HttpTransport> {
    /// Create a client for the given Personio base URL
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self::with_transport(HttpTransport::new(base_url)?))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            session: Session::new(),
            employee_id_override: None,
        }
    }

    /// Use this employee ID instead of the one scraped at login.
    pub fn with_employee_id(mut self, employee_id: Option<i64>) -> Self {
        self.employee_id_override = employee_id;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Log in with email and password.
    ///
    /// When Personio does not know this device the session moves to
    /// `AwaitingDeviceChallenge` and `AuthChallengeRequired` is returned; call
    /// again with credentials carrying the CSRF token and the emailed token.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<&SessionData, ApiError> {
        let mut form = vec![
            ("email", credentials.email.as_str()),
            ("password", credentials.password.as_str()),
        ];
        if let Some(ref csrf_token) = credentials.csrf_token {
            form.push(("_token", csrf_token.as_str()));
        }
        if let Some(ref email_token) = credentials.email_token {
            form.push(("token", email_token.as_str()));
        }

        debug!(
            email = %credentials.email,
            challenge_response = credentials.has_challenge_response(),
            "Logging in"
        );
        let response = self
            .transport
            .send(ApiRequest::post(LOGIN_PATH).form(form))
            .await?;

        match classify_login_response(response.status, &response.body) {
            LoginOutcome::Challenge { csrf_token } => {
                if credentials.email_token.is_some() {
                    warn!("Device challenge repeated, the email token was not accepted");
                }
                info!("New device challenge issued");
                self.session.await_challenge(csrf_token.clone());
                Err(ApiError::AuthChallengeRequired { csrf_token })
            }
            LoginOutcome::Rejected(reason) => {
                self.session.clear();
                Err(ApiError::AuthFailure(reason))
            }
            LoginOutcome::Malformed(reason) => {
                self.session.clear();
                Err(ApiError::InvalidResponse(reason))
            }
            LoginOutcome::ServerError => {
                self.session.clear();
                Err(ApiError::from_status(response.status, &response.body))
            }
            LoginOutcome::LoggedIn { employee_id } => {
                let session_cookie = response
                    .cookie(SESSION_COOKIE)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ApiError::AuthFailure("login did not set a session cookie".to_string())
                    })?;
                let xsrf_token = response.cookie(XSRF_COOKIE).map(decode_cookie);
                let employee_id = self
                    .employee_id_override
                    .or(employee_id)
                    .ok_or_else(|| {
                        ApiError::AuthFailure(
                            "could not determine the employee ID, set it in the config".to_string(),
                        )
                    })?;

                info!(employee_id, "Logged in");
                self.session.establish(SessionData {
                    session_cookie,
                    xsrf_token,
                    employee_id,
                    email: credentials.email.clone(),
                    logged_in_at: Utc::now(),
                });
                self.session.ensure_logged_in()
            }
        }
    }

    /// Fetch the attendance calendar of an employee for `[start, end]`.
    pub async fn attendance_calendar(
        &self,
        employee_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AttendanceCalendar, ApiError> {
        self.session.ensure_logged_in()?;
        if end < start {
            return Err(ApiError::InvalidRequest(format!(
                "calendar end {end} is before start {start}"
            )));
        }

        let request = ApiRequest::get(format!("{CALENDAR_PATH}/{employee_id}"))
            .query("start_date", start.format(DATE_FORMAT).to_string())
            .query("end_date", end.format(DATE_FORMAT).to_string());

        let mut calendar: AttendanceCalendar = self.send_json(request).await?;
        calendar.retain_window(start, end);
        debug!(
            employee_id,
            days = calendar.attendance_days.data.len(),
            "Fetched attendance calendar"
        );
        Ok(calendar)
    }

    /// Fetch the logged in employee's working time periods.
    pub async fn working_time_periods(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<WorkingTimePeriod>, ApiError> {
        let session = self.session.ensure_logged_in()?;
        if to < from {
            return Err(ApiError::InvalidRequest(format!(
                "periods end {to} is before start {from}"
            )));
        }

        let request = ApiRequest::get(PERIODS_PATH)
            .query("filter[startDate]", from.format(DATE_FORMAT).to_string())
            .query("filter[endDate]", to.format(DATE_FORMAT).to_string())
            .query("filter[employee]", session.employee_id.to_string());

        self.send_json(request).await
    }

    /// Create working time period records.
    pub async fn create_working_time_periods(
        &self,
        records: &[NewWorkingTimePeriod],
    ) -> Result<Vec<CreatedPeriod>, ApiError> {
        self.session.ensure_logged_in()?;
        let body = serde_json::to_value(records)
            .map_err(|e| ApiError::InvalidRequest(format!("encode body: {e}")))?;

        let request = self.with_xsrf(ApiRequest::post(PERIODS_PATH).json(body));
        self.send_json(request).await
    }

    /// Replace the periods of an attendance day.
    pub async fn update_attendance_day(
        &self,
        day_id: &str,
        update: &AttendanceDayUpdate,
    ) -> Result<(), ApiError> {
        self.session.ensure_logged_in()?;
        let body = serde_json::to_value(update)
            .map_err(|e| ApiError::InvalidRequest(format!("encode body: {e}")))?;

        let request = self.with_xsrf(ApiRequest::put(format!("{DAYS_PATH}/{day_id}")).json(body));
        // Only success matters, the echoed day is discarded
        let _: Value = self.send_json(request).await?;
        Ok(())
    }

    fn with_xsrf(&self, request: ApiRequest) -> ApiRequest {
        match self
            .session
            .ensure_logged_in()
            .ok()
            .and_then(|s| s.xsrf_token.as_deref())
        {
            Some(token) if request.is_write() => request.header(XSRF_HEADER, token),
            _ => request,
        }
    }

    async fn send_json<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R, ApiError> {
        let method = request.method.clone();
        let path = request.path.clone();

        let response = self.transport.send(request).await?;
        if !response.status.is_success() {
            warn!(%method, path = %path, status = response.status.as_u16(), "API request failed");
            return Err(ApiError::from_status(response.status, &response.body));
        }
        parse_envelope(response.status.as_u16(), &response.body)
            .map_err(|e| match e {
                ApiError::InvalidResponse(msg) => {
                    ApiError::InvalidResponse(format!("{method} {path}: {msg}"))
                }
                other => other,
            })
    }
}

#[async_trait]
impl<T: Transport> AttendanceDaySource for ApiClient<T> {
    async fn attendance_days(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceCalendarDay>, ApiError> {
        let employee_id = self.session.ensure_logged_in()?.employee_id;
        let calendar = self.attendance_calendar(employee_id, start, end).await?;
        Ok(calendar.attendance_days.data)
    }
}

impl<T> std::fmt::Debug for ApiClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("session", &self.session)
            .field("employee_id_override", &self.employee_id_override)
            .finish_non_exhaustive()
    }
}

/// Unwrap `{"success": ..., "data": ...}` if present, then decode.
///
/// `success: false` is a server-side rejection even on HTTP 200.
fn parse_envelope<R: DeserializeOwned>(status: u16, body: &str) -> Result<R, ApiError> {
    let value: Value = if body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))?
    };

    let payload = match value {
        Value::Object(mut map) if map.contains_key("success") => {
            if map.get("success").and_then(Value::as_bool) != Some(true) {
                let message = map
                    .get("error")
                    .and_then(|e| e.get("message").or(Some(e)))
                    .map(|m| match m {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| "request was not successful".to_string());
                return Err(ApiError::RemoteApi {
                    status,
                    body: message,
                });
            }
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };

    serde_json::from_value(payload).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

fn decode_cookie(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
