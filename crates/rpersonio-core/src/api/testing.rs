//! In-memory `Transport` for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use super::{ApiError, ApiRequest, ApiResponse, Transport};

struct Route {
    method: Method,
    path: String,
    responses: VecDeque<(StatusCode, String)>,
}

#[derive(Default)]
struct Inner {
    routes: Vec<Route>,
    requests: Vec<ApiRequest>,
    cookies: Vec<(String, String)>,
}

/// Scripted transport. Each route answers with its queued responses in
/// order and keeps repeating the last one. Unknown routes get a 404.
#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    inner: Arc<Mutex<Inner>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(&self, method: Method, path: &str, status: StatusCode, body: &str) {
        let mut inner = self.inner.lock().expect("fake transport lock");
        let response = (status, body.to_string());
        if let Some(route) = inner
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            route.responses.push_back(response);
        } else {
            inner.routes.push(Route {
                method,
                path: path.to_string(),
                responses: VecDeque::from([response]),
            });
        }
    }

    pub(crate) fn set_cookie(&self, name: &str, value: &str) {
        let mut inner = self.inner.lock().expect("fake transport lock");
        inner.cookies.retain(|(k, _)| k != name);
        inner.cookies.push((name.to_string(), value.to_string()));
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.inner.lock().expect("fake transport lock").requests.clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.inner.lock().expect("fake transport lock").requests.len()
    }

    pub(crate) fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut inner = self.inner.lock().expect("fake transport lock");
        let (status, body) = inner
            .routes
            .iter_mut()
            .find(|r| r.method == request.method && r.path == request.path)
            .and_then(|route| {
                if route.responses.len() > 1 {
                    route.responses.pop_front()
                } else {
                    route.responses.front().cloned()
                }
            })
            .unwrap_or((StatusCode::NOT_FOUND, "no route".to_string()));
        let cookies = inner.cookies.clone();
        inner.requests.push(request);

        Ok(ApiResponse {
            status,
            cookies,
            body,
        })
    }
}

/// Landing page served after a successful login.
pub(crate) const LANDING_PAGE: &str = r#"<html><script>window.EMPLOYEE = {"id": 42, "first_name": "Jane"};</script></html>"#;

/// Page served when Personio does not recognize the device.
pub(crate) const DEVICE_CHALLENGE_PAGE: &str = r#"<form method="POST" action="/login/index">
<input type="hidden" name="_token" value="csrf-abc">
<p>We sent a verification code to your email address.</p>
<input type="text" name="token" autocomplete="one-time-code">
</form>"#;

/// A transport whose login succeeds for employee 42.
pub(crate) fn logged_in_transport() -> FakeTransport {
    let transport = FakeTransport::new();
    transport.on(Method::POST, "/login/index", StatusCode::OK, LANDING_PAGE);
    transport.set_cookie("personio_session", "session-xyz");
    transport.set_cookie("XSRF-TOKEN", "xsrf%3D%3D");
    transport
}
