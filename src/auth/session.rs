use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::CookieJar;
use tracing::warn;

use super::{claims::Role, cookies::ACCESS_TOKEN_COOKIE, jwt::JwtKeys};
use crate::error::{ApiError, ApiResult};

/// The authenticated staff member behind a request.
///
/// This is the only place the access token is read; handlers never look at
/// cookies or headers for identity themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub id: i64,
    pub role: Role,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> ApiResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }

    /// Dietician id the caller is confined to, `None` for admins.
    pub fn dietician_scope(&self) -> Option<i64> {
        match self.role {
            Role::Admin => None,
            Role::Dietician => Some(self.id),
        }
    }

    /// Admins may act on any dietician, a dietician only on itself.
    pub fn require_self_or_admin(&self, dietician_id: i64) -> ApiResult<()> {
        match self.dietician_scope() {
            Some(own) if own != dietician_id => Err(ApiError::forbidden()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Missing access token".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(&token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;

        Ok(Session {
            id: claims.sub,
            role: claims.role,
        })
    }
}

/// Bearer header wins over the cookie. Cookie values may carry the scheme too.
fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(strip_bearer);
    if let Some(t) = from_header {
        return Some(t.to_string());
    }

    let jar = CookieJar::from_headers(headers);
    let cookie = jar.get(ACCESS_TOKEN_COOKIE)?;
    let value = cookie.value();
    let token = strip_bearer(value).unwrap_or(value).trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn strip_bearer(v: &str) -> Option<&str> {
    v.strip_prefix("Bearer ")
        .or_else(|| v.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::COOKIE, HeaderValue};

    #[test]
    fn bearer_header_is_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(COOKIE, HeaderValue::from_static("access_token=from-cookie"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn cookie_token_with_or_without_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("access_token=Bearer abc.def"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc.def"));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("other=1; access_token=abc.def"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn no_token_anywhere() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn scope_rules() {
        let admin = Session { id: 1, role: Role::Admin };
        let diet = Session { id: 9, role: Role::Dietician };
        assert!(admin.require_admin().is_ok());
        assert!(diet.require_admin().is_err());
        assert_eq!(admin.dietician_scope(), None);
        assert_eq!(diet.dietician_scope(), Some(9));
        assert!(admin.require_self_or_admin(3).is_ok());
        assert!(diet.require_self_or_admin(9).is_ok());
        assert!(diet.require_self_or_admin(3).is_err());
    }
}
