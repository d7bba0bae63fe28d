//! Request dispatch and response assembly.
//!
//! Built-in endpoints are matched first:
//!
//! - `POST /login`: checks the configured credentials
//! - `POST /logout`: drops the caller's session and clears the cookie
//! - `GET /index.html`: the login gate in front of the dashboard
//!
//! A request carrying a router hook is answered by the hook. Everything else
//! is static content chosen by media type.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::{AuthConfig, AuthMode};
use crate::content::{ContentError, ContentResolver};
use crate::http::cookie::{AUTH_COOKIE, Cookie, SESSION_COOKIE};
use crate::http::mime::mime_for_path;
use crate::http::parser::parse_http_request;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::http::router::Router;
use crate::session::SessionStore;

const DASHBOARD_DOC: &str = "/dashboard.html";
const LOGIN_DOC: &str = "/login.html";
const HTML: &str = "text/html";

pub struct Dispatcher {
    router: Router,
    content: ContentResolver,
    sessions: Arc<dyn SessionStore>,
    auth: AuthConfig,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(
        content: ContentResolver,
        sessions: Arc<dyn SessionStore>,
        auth: AuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            router: Router::new(),
            content,
            sessions,
            auth,
            clock,
        }
    }

    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Parses `raw` and answers it. A broken request line has no path to
    /// serve and gets the canonical 404 page.
    pub fn handle_raw(&self, raw: &[u8]) -> Response {
        match parse_http_request(raw, &self.router) {
            Ok(request) => self.build_response(&request),
            Err(e) => {
                warn!(error = %e, "Rejecting malformed request");
                Self::build_notfound()
            }
        }
    }

    pub fn build_response(&self, request: &Request) -> Response {
        let response = match (&request.method, request.path.as_str()) {
            (Method::POST, "/login") => self.login(request),
            (Method::POST, "/logout") => self.logout(request),
            (Method::GET, "/" | "/index.html") => self.index(request),
            _ => match &request.hook {
                Some(hook) => {
                    debug!(hook = hook.name(), "Dispatching to hook");
                    hook.call(request)
                }
                None => self.serve_static(request),
            },
        };

        info!(
            method = %request.method,
            path = %request.path,
            status = response.status.as_u16(),
            bytes = response.body.len(),
            "Request handled"
        );
        response
    }

    /// The canonical `404 Not Found` page.
    pub fn build_notfound() -> Response {
        Response::not_found()
    }

    /// The fixed header set sent with static content, in emission order.
    pub fn build_response_header(
        &self,
        request: &Request,
        content_type: &str,
        content: &[u8],
    ) -> Vec<(String, String)> {
        let echo = |name: &str, default: &str| request.header(name).unwrap_or(default).to_string();

        vec![
            ("Accept".into(), echo("Accept", "application/json")),
            ("Accept-Language".into(), echo("Accept-Language", "en-US,en;q=0.9")),
            ("Authorization".into(), echo("Authorization", "Basic <credentials>")),
            ("Cache-Control".into(), "no-cache".into()),
            ("Content-Type".into(), content_type.into()),
            ("Content-Length".into(), content.len().to_string()),
            ("Date".into(), httpdate::fmt_http_date(self.clock.now())),
            ("Max-Forward".into(), "10".into()),
            ("Pragma".into(), "no-cache".into()),
            ("Proxy-Authorization".into(), "Basic dXNlcjpwYXNz".into()),
            ("Warning".into(), "199 Miscellaneous warning".into()),
            ("User-Agent".into(), echo("User-Agent", "Chrome/123.0.0.0")),
        ]
    }

    fn login(&self, request: &Request) -> Response {
        let form = request.form_decoded();
        let username = form.get("username").map(String::as_str).unwrap_or_default();
        let password = form.get("password").map(String::as_str).unwrap_or_default();

        if username != self.auth.username || password != self.auth.password {
            warn!(username, "Login failed");
            return self.document(StatusCode::Unauthorized, LOGIN_DOC, None);
        }

        let cookie = match self.auth.mode {
            AuthMode::Flag => Cookie::auth_flag(),
            AuthMode::Session => match self.sessions.create(username) {
                Ok(session) => {
                    Cookie::session(&session.id, self.sessions.timeout(), self.clock.now())
                }
                Err(e) => {
                    error!(username, error = %e, "Could not create session");
                    return Response::internal_error();
                }
            },
        };

        info!(username, mode = ?self.auth.mode, "Login succeeded");
        self.document(StatusCode::Ok, DASHBOARD_DOC, Some(cookie))
    }

    fn logout(&self, request: &Request) -> Response {
        if let Some(id) = request.cookie(SESSION_COOKIE) {
            if let Err(e) = self.sessions.destroy(id) {
                error!(session = id, error = %e, "Could not destroy session");
                return Response::internal_error();
            }
        }

        let cleared = match self.auth.mode {
            AuthMode::Flag => Cookie::clear(AUTH_COOKIE),
            AuthMode::Session => Cookie::clear(SESSION_COOKIE),
        };
        self.document(StatusCode::Ok, LOGIN_DOC, Some(cleared))
    }

    fn index(&self, request: &Request) -> Response {
        if self.is_authenticated(request) {
            self.document(StatusCode::Ok, DASHBOARD_DOC, None)
        } else {
            debug!("No valid credentials cookie");
            self.document(StatusCode::Unauthorized, LOGIN_DOC, None)
        }
    }

    fn is_authenticated(&self, request: &Request) -> bool {
        match self.auth.mode {
            AuthMode::Flag => request.cookie(AUTH_COOKIE) == Some("true"),
            AuthMode::Session => {
                let Some(id) = request.cookie(SESSION_COOKIE) else {
                    return false;
                };
                self.sessions.validate(id).unwrap_or_else(|e| {
                    error!(session = id, error = %e, "Session lookup failed");
                    false
                })
            }
        }
    }

    /// One of the gate's HTML documents with the given status.
    fn document(&self, status: StatusCode, name: &str, cookie: Option<Cookie>) -> Response {
        let content = match self.content.load(name, HTML) {
            Ok(content) => content,
            Err(e) => return self.load_failure(e, HTML),
        };

        let mut builder = ResponseBuilder::new(status).header("Content-Type", HTML);
        if let Some(cookie) = cookie {
            builder = builder.header("Set-Cookie", cookie.to_string());
        }
        builder
            .header("Content-Length", "")
            .header("Connection", "close")
            .body(content)
            .build()
    }

    fn serve_static(&self, request: &Request) -> Response {
        let mime = mime_for_path(&request.path);

        match self.content.load(&request.path, mime) {
            Ok(content) => ResponseBuilder::new(StatusCode::Ok)
                .headers(self.build_response_header(request, mime, &content))
                .body(content)
                .build(),
            Err(e @ (ContentError::UnsupportedMediaType(_) | ContentError::OutsideRoot(_))) => {
                debug!(path = %request.path, error = %e, "Not serving path");
                Self::build_notfound()
            }
            Err(e) => self.load_failure(e, mime),
        }
    }

    fn load_failure(&self, e: ContentError, content_type: &str) -> Response {
        let status = match e {
            ContentError::ServerError { .. } => StatusCode::InternalServerError,
            _ => StatusCode::NotFound,
        };
        debug!(error = %e, status = status.as_u16(), "Content load failed");

        ResponseBuilder::new(status)
            .header("Content-Type", content_type)
            .header("Connection", "close")
            .body(e.canonical_body().to_vec())
            .build()
    }
}
