//! Session cookie builders.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::token::SESSION_TTL_SECS;

/// Cookie name for the session token.
pub const SESSION_COOKIE: &str = "token";

/// Attributes applied to every session cookie.
#[derive(Debug, Clone, Default)]
pub struct CookieSettings {
    pub secure: bool,
    pub domain: Option<String>,
}

fn build(value: String, max_age: Duration, settings: &CookieSettings) -> Cookie<'static> {
    let mut builder = Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .max_age(max_age)
        .http_only(true)
        .secure(settings.secure)
        .same_site(SameSite::Lax);
    if let Some(domain) = &settings.domain {
        builder = builder.domain(domain.clone());
    }
    builder.build()
}

/// Set the session cookie on the jar.
///
/// ```
/// use axum_extra::extract::cookie::CookieJar;
/// use canteen_auth_types::cookie::{set_session_cookie, CookieSettings, SESSION_COOKIE};
///
/// let settings = CookieSettings { secure: true, domain: None };
/// let jar = set_session_cookie(CookieJar::new(), "jwt".to_string(), &settings);
/// let cookie = jar.get(SESSION_COOKIE).unwrap();
/// assert_eq!(cookie.path(), Some("/"));
/// assert_eq!(cookie.max_age(), Some(time::Duration::seconds(604800)));
/// assert!(cookie.http_only().unwrap_or(false));
/// assert!(cookie.secure().unwrap_or(false));
/// ```
pub fn set_session_cookie(jar: CookieJar, value: String, settings: &CookieSettings) -> CookieJar {
    jar.add(build(
        value,
        Duration::seconds(SESSION_TTL_SECS as i64),
        settings,
    ))
}

/// Clear the session cookie by setting Max-Age to 0.
pub fn clear_session_cookie(jar: CookieJar, settings: &CookieSettings) -> CookieJar {
    jar.add(build(String::new(), Duration::ZERO, settings))
}
