//! Session cookie handling.
//!
//! The cookie value is the raw session token. It is issued `HttpOnly`,
//! `SameSite=Strict`, `Path=/`, with `Max-Age` equal to the session's
//! remaining lifetime, and `Secure` in production.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use capacity_core::types::Timestamp;
use chrono::Utc;
use time::Duration;

/// Extract the session token from the request's `Cookie` header(s).
///
/// Matches the cookie name exactly, tolerates surrounding whitespace and any
/// number of unrelated cookies in any order, and treats an empty value as
/// absent.
pub fn session_token_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Build the session cookie for a newly issued or extended session.
pub fn session_cookie(
    name: &str,
    token: &str,
    expires_at: Timestamp,
    secure: bool,
) -> Cookie<'static> {
    let remaining = (expires_at - Utc::now()).num_seconds().max(0);
    Cookie::build((name.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::seconds(remaining))
        .build()
}

/// Build a removal cookie for the session.
pub fn clear_session_cookie(name: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use axum::http::header::COOKIE;
    use axum::http::HeaderValue;

    use super::*;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn extracts_token_among_other_cookies() {
        let h = headers("theme=dark; sessionToken=abc123; lang=en");
        assert_eq!(
            session_token_from_headers(&h, "sessionToken").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn tolerates_stray_whitespace_and_separators() {
        let h = headers("  theme=dark ;;   sessionToken = abc123  ; stray ;");
        assert_eq!(
            session_token_from_headers(&h, "sessionToken").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn requires_exact_name_match() {
        let h = headers("sessionTokenOld=zzz; xsessionToken=yyy");
        assert_eq!(session_token_from_headers(&h, "sessionToken"), None);
    }

    #[test]
    fn empty_value_counts_as_absent() {
        let h = headers("sessionToken=; theme=dark");
        assert_eq!(session_token_from_headers(&h, "sessionToken"), None);
        assert_eq!(session_token_from_headers(&HeaderMap::new(), "sessionToken"), None);
    }

    #[test]
    fn reads_across_multiple_cookie_headers() {
        let mut h = HeaderMap::new();
        h.append(COOKIE, HeaderValue::from_static("theme=dark"));
        h.append(COOKIE, HeaderValue::from_static("sessionToken=fromsecond"));
        assert_eq!(
            session_token_from_headers(&h, "sessionToken").as_deref(),
            Some("fromsecond")
        );
    }

    #[test]
    fn session_cookie_carries_security_attributes() {
        let expires = Utc::now() + chrono::Duration::hours(24);
        let rendered = session_cookie("sessionToken", "abc", expires, true).to_string();

        assert!(rendered.starts_with("sessionToken=abc"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("SameSite=Strict"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=8639"), "got {rendered}");
    }

    #[test]
    fn insecure_cookie_outside_production() {
        let expires = Utc::now() + chrono::Duration::hours(1);
        let rendered = session_cookie("sessionToken", "abc", expires, false).to_string();
        assert!(!rendered.contains("Secure"));
    }

    #[test]
    fn clearing_cookie_expires_immediately() {
        let rendered = clear_session_cookie("sessionToken", false).to_string();
        assert!(rendered.starts_with("sessionToken="));
        assert!(rendered.contains("Max-Age=0"));
    }
}
