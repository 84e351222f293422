//! # Session Cookie
//!
//! The session identifier travels in a cookie. A missing, malformed or
//! otherwise unrecognized value simply starts a new session.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::HttpRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque per-user session key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_hyphenated())
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Settings for reading and issuing the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    secure: bool,
    max_age_minutes: u64,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, secure: bool, max_age_minutes: u64) -> Self {
        Self {
            name: name.into(),
            secure,
            max_age_minutes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Find the caller's session.
    ///
    /// Returns the id plus `true` when it was freshly generated, in which
    /// case the response must carry a new cookie.
    pub fn resolve(&self, req: &HttpRequest) -> (SessionId, bool) {
        match req
            .cookie(&self.name)
            .and_then(|c| c.value().parse::<SessionId>().ok())
        {
            Some(id) => (id, false),
            None => (SessionId::generate(), true),
        }
    }

    /// Build the cookie carrying `id`.
    ///
    /// Responses that write the session re-issue it, so the cookie's lifetime
    /// follows the store's idle timeout; read-only routes leave it alone.
    pub fn issue(&self, id: &SessionId) -> Cookie<'static> {
        Cookie::build(self.name.clone(), id.to_string())
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(CookieDuration::minutes(self.max_age_minutes as i64))
            .finish()
    }
}
