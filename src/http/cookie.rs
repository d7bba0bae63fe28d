//! `Set-Cookie` values used by the login gate.

use std::fmt;
use std::time::{Duration, SystemTime};

pub const SESSION_COOKIE: &str = "sessionId";
pub const AUTH_COOKIE: &str = "auth";

const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub http_only: bool,
    /// `Max-Age` in seconds
    pub max_age: Option<u64>,
    pub expires: Option<SystemTime>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            http_only: true,
            max_age: None,
            expires: None,
        }
    }

    /// `sessionId=<id>; Path=/; HttpOnly; Max-Age=<n>; Expires=<now + n>`
    pub fn session(id: &str, max_age: Duration, now: SystemTime) -> Self {
        Self {
            max_age: Some(max_age.as_secs()),
            expires: Some(now + max_age),
            ..Self::new(SESSION_COOKIE, id)
        }
    }

    /// Tells the browser to drop `name` immediately.
    pub fn clear(name: &str) -> Self {
        Self {
            max_age: Some(0),
            expires: Some(SystemTime::UNIX_EPOCH),
            ..Self::new(name, "")
        }
    }

    /// The boolean login marker, `auth=true; Path=/; HttpOnly`.
    pub fn auth_flag() -> Self {
        Self::new(AUTH_COOKIE, "true")
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={}", max_age)?;
        }
        match self.expires {
            Some(t) if t <= SystemTime::UNIX_EPOCH => write!(f, "; Expires={}", EPOCH_EXPIRES)?,
            Some(t) => write!(f, "; Expires={}", httpdate::fmt_http_date(t))?,
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_flag_format() {
        assert_eq!(Cookie::auth_flag().to_string(), "auth=true; Path=/; HttpOnly");
    }

    #[test]
    fn clear_format() {
        assert_eq!(
            Cookie::clear(SESSION_COOKIE).to_string(),
            "sessionId=; Path=/; HttpOnly; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
        );
    }

    #[test]
    fn session_expiry_is_rfc1123() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_445_412_480);
        let cookie = Cookie::session("abc", Duration::from_secs(120), now);

        assert_eq!(
            cookie.to_string(),
            "sessionId=abc; Path=/; HttpOnly; Max-Age=120; Expires=Wed, 21 Oct 2015 07:30:00 GMT"
        );
    }
}
