use std::time::Duration;

use chrono::{DateTime, Utc};

pub const AUTH_COOKIE: &str = "authToken";
pub const SESSION_COOKIE: &str = "sessionId";
pub const COOKIE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Credentials obtained at login. Created by a successful login and
/// dropped on logout or when the relay answers 401.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            session_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn authorization(&self) -> String {
        token_header(&self.token)
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at).num_seconds() >= COOKIE_MAX_AGE.as_secs() as i64
    }
}

pub fn token_header(token: &str) -> String {
    format!("Token {token}")
}

/// Accepts `Token <t>` and `Bearer <t>`.
pub fn token_from_authorization(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    match scheme {
        "Token" | "Bearer" => Some(token),
        _ => None,
    }
}

pub fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

pub fn set_cookie(name: &str, value: &str) -> String {
    format!(
        "{name}={value}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        COOKIE_MAX_AGE.as_secs()
    )
}

pub fn clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_schemes() {
        assert_eq!(token_from_authorization("Token abc"), Some("abc"));
        assert_eq!(token_from_authorization("Bearer  xyz "), Some("xyz"));
        assert_eq!(token_from_authorization("Basic abc"), None);
        assert_eq!(token_from_authorization("Token "), None);
        assert_eq!(Session::new("abc").authorization(), "Token abc");
    }

    #[test]
    fn cookies_round_trip_through_headers() {
        let header = "theme=dark; authToken=abc; sessionId=s1";
        assert_eq!(cookie_value(header, AUTH_COOKIE), Some("abc"));
        assert_eq!(cookie_value(header, SESSION_COOKIE), Some("s1"));
        assert_eq!(cookie_value("authToken=", AUTH_COOKIE), None);
        assert_eq!(
            set_cookie(AUTH_COOKIE, "abc"),
            "authToken=abc; Path=/; Max-Age=86400; HttpOnly; SameSite=Lax"
        );
        assert!(clear_cookie(AUTH_COOKIE).contains("Max-Age=0"));
    }

    #[test]
    fn sessions_expire_after_a_day() {
        let session = Session::new("abc");
        assert!(!session.is_stale(session.created_at));
        assert!(session.is_stale(session.created_at + chrono::Duration::hours(24)));
    }
}
