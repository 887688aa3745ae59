use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

use crate::services::admin::AdminError;

/// An authorized administrator.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub username: String,
}

/// `Authorization: Basic base64(username:password)` -> (username, password).
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let auth_header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = auth_header.strip_prefix("Basic ")?;

    // Декодируем base64
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    // Разделяем username:password
    let (username, password) = credentials.split_once(':')?;
    if username.is_empty() {
        return None;
    }
    Some((username.to_string(), password.to_string()))
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// Bearer JWT + живой флаг сессии в Redis
impl FromRequestParts<Arc<crate::AppState>> for AdminUser {
    type Rejection = AdminError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AdminError::InvalidCredentials)?;
        let username = state.admin.authorize(token).await?;
        Ok(AdminUser { username })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parses_basic_credentials() {
        let encoded = general_purpose::STANDARD.encode("root:pa:ss");
        let parsed = basic_credentials(&headers(&format!("Basic {encoded}")));
        assert_eq!(parsed, Some(("root".to_string(), "pa:ss".to_string())));
    }

    #[test]
    fn rejects_malformed_basic_credentials() {
        assert_eq!(basic_credentials(&headers("Basic !!!")), None);
        let no_colon = general_purpose::STANDARD.encode("root");
        assert_eq!(basic_credentials(&headers(&format!("Basic {no_colon}"))), None);
        assert_eq!(basic_credentials(&HeaderMap::new()), None);
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Basic abc")), None);
    }
}
