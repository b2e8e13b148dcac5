//! Session cookies carrying the access and refresh tokens.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use fintrack::auth::TokenLifetimes;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Attributes shared by both session cookies
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    /// Send only over HTTPS
    pub secure: bool,
    pub access_max_age: time::Duration,
    pub refresh_max_age: time::Duration,
}

impl CookieSettings {
    /// Cookie lifetimes follow the token lifetimes
    pub fn new(secure: bool, lifetimes: TokenLifetimes) -> Self {
        Self {
            secure,
            access_max_age: time::Duration::seconds(lifetimes.access.num_seconds()),
            refresh_max_age: time::Duration::seconds(lifetimes.refresh.num_seconds()),
        }
    }

    /// Add both session cookies to the jar
    pub fn set_auth_tokens(&self, jar: CookieJar, access_token: &str, refresh_token: &str) -> CookieJar {
        jar.add(self.cookie(ACCESS_TOKEN_COOKIE, access_token, self.access_max_age))
            .add(self.cookie(REFRESH_TOKEN_COOKIE, refresh_token, self.refresh_max_age))
    }

    fn cookie(&self, name: &'static str, value: &str, max_age: time::Duration) -> Cookie<'static> {
        Cookie::build((name, value.to_string()))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(max_age)
            .build()
    }
}

/// Expire both session cookies
pub fn clear_auth_tokens(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_TOKEN_COOKIE).path("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_attributes() {
        let settings = CookieSettings::new(true, TokenLifetimes::default());
        let jar = settings.set_auth_tokens(CookieJar::new(), "access", "refresh");

        let access = jar.get(ACCESS_TOKEN_COOKIE).unwrap();
        assert_eq!(access.value(), "access");
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(access.same_site(), Some(SameSite::Lax));
        assert_eq!(access.path(), Some("/"));
        assert_eq!(access.max_age(), Some(time::Duration::minutes(15)));

        let refresh = jar.get(REFRESH_TOKEN_COOKIE).unwrap();
        assert_eq!(refresh.value(), "refresh");
        assert_eq!(refresh.max_age(), Some(time::Duration::days(7)));
    }

    #[test]
    fn test_clear_removes_both_cookies() {
        let settings = CookieSettings::new(false, TokenLifetimes::default());
        let jar = settings.set_auth_tokens(CookieJar::new(), "access", "refresh");

        let jar = clear_auth_tokens(jar);

        assert!(jar.get(ACCESS_TOKEN_COOKIE).is_none());
        assert!(jar.get(REFRESH_TOKEN_COOKIE).is_none());
    }
}
