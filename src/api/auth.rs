//! Session cookie handling

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::Duration;
use uuid::Uuid;

use crate::accounts::SESSION_COOKIE;
use crate::api::error::ApiError;
use crate::app::AppState;

/// A request made with a live session cookie
#[derive(Debug, Clone, Copy)]
pub struct CurrentSession {
    pub token: Uuid,
    pub user_pk: u64,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or_else(ApiError::login_required)?;
        let session = state
            .sessions
            .get(&token)
            .ok_or_else(ApiError::login_required)?;
        Ok(Self {
            token,
            user_pk: session.user_pk,
        })
    }
}

/// Extracts the session token from the `Cookie` headers
pub fn session_token(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// `Set-Cookie` value opening a session
pub fn session_cookie(token: Uuid, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.num_seconds().max(0)
    )
}

/// `Set-Cookie` value removing the session cookie
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_found_among_cookies() {
        let token = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={token}; lang=ko"))
                .unwrap(),
        );
        assert_eq!(session_token(&headers), Some(token));
    }

    #[test]
    fn test_missing_or_garbage_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE}=not-a-uuid")).unwrap(),
        );
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn test_cookie_values() {
        let token = Uuid::new_v4();
        let cookie = session_cookie(token, Duration::hours(24));
        assert!(cookie.starts_with(&format!("{SESSION_COOKIE}={token};")));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("Max-Age=86400"));
        assert!(clear_session_cookie().ends_with("Max-Age=0"));
    }
}
