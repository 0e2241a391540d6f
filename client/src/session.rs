//! # Session
//!
//! Who the client is logged in as, from the backend's point of view.
//!
//! The backend authenticates with a `sessionid` cookie and protects every POST with a
//! CSRF token. The token is echoed from the `csrftoken` cookie into an `X-CSRFToken`
//! header. No local validation: a missing cookie just sends an empty header and the
//! backend decides.
pub const SESSION_COOKIE: &str = "sessionid";
pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub authenticated: bool,
    pub cookie: Option<String>,
    pub csrf_token: Option<String>,
}

impl Session {
    /// Builds a session from a raw `Cookie` header value such as
    /// `sessionid=abc; csrftoken=xyz`.
    pub fn from_cookie(cookie: Option<String>) -> Self {
        let cookie = cookie.filter(|c| !c.trim().is_empty());

        let authenticated = cookie
            .as_deref()
            .and_then(|c| cookie_value(c, SESSION_COOKIE))
            .is_some_and(|value| !value.is_empty());

        let csrf_token = cookie
            .as_deref()
            .and_then(|c| cookie_value(c, CSRF_COOKIE))
            .map(str::to_string);

        Self {
            authenticated,
            cookie,
            csrf_token,
        }
    }

    pub fn csrf_header_value(&self) -> &str {
        self.csrf_token.as_deref().unwrap_or_default()
    }
}

pub fn cookie_value<'a>(cookies: &'a str, name: &str) -> Option<&'a str> {
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
}
