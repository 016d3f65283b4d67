use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::Serialize;

use crate::api::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionData {
    /// Value of the `personio_session` cookie
    #[serde(skip_serializing)]
    pub session_cookie: String,
    /// URL-decoded `XSRF-TOKEN` cookie, echoed back on writes
    #[serde(skip_serializing)]
    pub xsrf_token: Option<String>,
    pub employee_id: i64,
    pub email: String,
    pub logged_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    LoggedOut,
    /// The server wants the emailed one-time token together with this CSRF token.
    AwaitingDeviceChallenge { csrf_token: String },
    LoggedIn(SessionData),
}

/// Login state for one run.
#[derive(Debug, Default)]
pub struct Session {
    state: AuthState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.state, AuthState::LoggedIn(_))
    }

    /// Session data, or `NotLoggedIn` if the login has not completed.
    pub fn ensure_logged_in(&self) -> Result<&SessionData, ApiError> {
        match &self.state {
            AuthState::LoggedIn(data) => Ok(data),
            _ => Err(ApiError::NotLoggedIn),
        }
    }

    pub fn employee_id(&self) -> Option<i64> {
        match &self.state {
            AuthState::LoggedIn(data) => Some(data.employee_id),
            _ => None,
        }
    }

    /// CSRF token of a pending device challenge
    pub fn pending_csrf_token(&self) -> Option<&str> {
        match &self.state {
            AuthState::AwaitingDeviceChallenge { csrf_token } => Some(csrf_token),
            _ => None,
        }
    }

    pub(crate) fn await_challenge(&mut self, csrf_token: String) {
        self.state = AuthState::AwaitingDeviceChallenge { csrf_token };
    }

    pub(crate) fn establish(&mut self, data: SessionData) {
        self.state = AuthState::LoggedIn(data);
    }

    pub fn clear(&mut self) {
        self.state = AuthState::LoggedOut;
    }
}

// ============================================================================
// Login response classification
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LoginOutcome {
    LoggedIn { employee_id: Option<i64> },
    Challenge { csrf_token: String },
    Rejected(String),
    Malformed(String),
    ServerError,
}

/// Decide what a `/login/index` response means.
///
/// The device challenge is checked first: Personio already hands out a
/// session cookie on that page, so a cookie alone proves nothing.
pub(crate) fn classify_login_response(status: StatusCode, body: &str) -> LoginOutcome {
    if has_input(body, "token") {
        return match input_value(body, "_token") {
            Some(csrf_token) if !csrf_token.is_empty() => LoginOutcome::Challenge { csrf_token },
            _ => LoginOutcome::Malformed("device challenge page without a CSRF token".to_string()),
        };
    }

    match status.as_u16() {
        401 | 403 | 419 | 422 => {
            return LoginOutcome::Rejected(format!("server answered {status}"));
        }
        _ if !status.is_success() => return LoginOutcome::ServerError,
        _ => {}
    }

    // Landing back on the login form means the credentials were refused
    if has_input(body, "password") {
        return LoginOutcome::Rejected("invalid email or password".to_string());
    }

    LoginOutcome::LoggedIn {
        employee_id: scrape_employee_id(body),
    }
}

static INPUT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<input\b[^>]*>").expect("input tag regex should compile"));

static NAME_ATTR: Lazy<Regex> = Lazy::new(|| attribute_regex("name"));

static VALUE_ATTR: Lazy<Regex> = Lazy::new(|| attribute_regex("value"));

/// Tried in order; keys must not be a suffix of a longer name such as
/// `manager_employee_id`.
static EMPLOYEE_ID_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        r#"(?i)EMPLOYEE\s*=\s*\{[^}]*?["']?id["']?\s*:\s*["']?(\d+)"#,
        r#"(?i)(?:^|[^\w])["']?employee_?id["']?\s*[:=]\s*["']?(\d+)"#,
        r#"(?i)(?:^|[^\w-])data-employee-id\s*=\s*["'](\d+)["']"#,
    ]
    .map(|pattern| Regex::new(pattern).expect("employee id regex should compile"))
});

fn attribute_regex(name: &str) -> Regex {
    Regex::new(&format!(r#"(?i)\s{name}\s*=\s*(?:"([^"]*)"|'([^']*)')"#))
        .expect("attribute regex should compile")
}

/// Whether the page has an `<input>` with the given name.
fn has_input(body: &str, name: &str) -> bool {
    input_tags(body).any(|tag| attribute(&NAME_ATTR, tag).as_deref() == Some(name))
}

/// `value` attribute of the first `<input>` with the given name.
fn input_value(body: &str, name: &str) -> Option<String> {
    input_tags(body)
        .find(|tag| attribute(&NAME_ATTR, tag).as_deref() == Some(name))
        .and_then(|tag| attribute(&VALUE_ATTR, tag))
}

fn input_tags(body: &str) -> impl Iterator<Item = &str> {
    INPUT_TAG.find_iter(body).map(|m| m.as_str())
}

fn attribute(re: &Regex, tag: &str) -> Option<String> {
    let caps = re.captures(tag)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Employee ID embedded in the page the login redirects to.
pub(crate) fn scrape_employee_id(body: &str) -> Option<i64> {
    EMPLOYEE_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(body)?.get(1)?.as_str().parse().ok())
}
