use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// HTTP-only cookie carrying the session token for browser clients
pub const SESSION_COOKIE: &str = "Authentication";

fn base_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(if secure { SameSite::Strict } else { SameSite::Lax })
        .build()
}

pub fn set_session_cookie(jar: CookieJar, token: &str, secure: bool) -> CookieJar {
    jar.add(base_cookie(token.to_string(), secure))
}

pub fn clear_session_cookie(jar: CookieJar, secure: bool) -> CookieJar {
    let mut cookie = base_cookie(String::new(), secure);
    cookie.make_removal();
    jar.add(cookie)
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Bearer header wins over the cookie
pub fn session_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    extract_bearer_token(headers)
        .map(str::to_string)
        .or_else(|| {
            jar.get(SESSION_COOKIE)
                .map(|c| c.value().trim().to_string())
                .filter(|v| !v.is_empty())
        })
}
