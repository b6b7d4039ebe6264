use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use axum::http::header::InvalidHeaderValue;
use time::Duration;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// First non-empty value of `name` across every `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, val)| key.trim() == name && !val.trim().is_empty())
        .map(|(_, val)| val.trim().to_string())
}

/// Access token from `Authorization: Bearer`, falling back to the cookie.
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_value(headers, ACCESS_COOKIE))
}

pub fn set_cookie(
    name: &str,
    value: &str,
    max_age: Duration,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age.whole_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn clear_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    set_cookie(name, "", Duration::ZERO, secure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.append(*k, HeaderValue::from_str(v).unwrap());
        }
        h
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let h = headers(&[
            ("authorization", "Bearer abc"),
            ("cookie", "access_token=from-cookie"),
        ]);
        assert_eq!(access_token(&h).as_deref(), Some("abc"));
    }

    #[test]
    fn cookie_is_the_fallback() {
        let h = headers(&[("cookie", "theme=dark; access_token=xyz; refresh_token=r")]);
        assert_eq!(access_token(&h).as_deref(), Some("xyz"));
        assert_eq!(cookie_value(&h, REFRESH_COOKIE).as_deref(), Some("r"));
    }

    #[test]
    fn malformed_pairs_are_skipped() {
        let h = headers(&[("cookie", "junk; access_token=ok")]);
        assert_eq!(access_token(&h).as_deref(), Some("ok"));
    }

    #[test]
    fn empty_or_foreign_schemes_yield_nothing() {
        assert_eq!(access_token(&HeaderMap::new()), None);
        assert_eq!(access_token(&headers(&[("authorization", "Bearer ")])), None);
        assert_eq!(access_token(&headers(&[("authorization", "Basic Zm9v")])), None);
        assert_eq!(access_token(&headers(&[("cookie", "access_token=")])), None);
    }

    #[test]
    fn cookie_attributes() {
        let v = set_cookie(ACCESS_COOKIE, "t", Duration::minutes(30), false).unwrap();
        assert_eq!(
            v.to_str().unwrap(),
            "access_token=t; Path=/; HttpOnly; SameSite=Lax; Max-Age=1800"
        );
        let v = clear_cookie(REFRESH_COOKIE, true).unwrap();
        assert_eq!(
            v.to_str().unwrap(),
            "refresh_token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure"
        );
    }
}
