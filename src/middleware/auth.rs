use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::{Error, Result};
use crate::services::auth_service::CurrentUser;
use crate::AppState;

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>> {
    let Some(auth_header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let auth_str = auth_header
        .to_str()
        .map_err(|_| Error::Unauthorized("Unauthenticated".to_string()))?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Unauthorized("Unauthenticated".to_string()))?;
    Ok(Some(token))
}

/// Rejects the request with 401 unless it carries a live bearer token.
/// The resolved [`CurrentUser`] is stored in the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(req.headers())?
        .ok_or_else(|| Error::Unauthorized("Unauthenticated".to_string()))?
        .to_string();
    let current = state.auth_service.resolve(&token).await?;
    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}

/// Public routes: no header means anonymous, a header that fails to resolve
/// is still a 401.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(req.headers())?.map(str::to_string);
    if let Some(token) = token {
        let current: CurrentUser = state.auth_service.resolve(&token).await?;
        req.extensions_mut().insert(current);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_tokens() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers).unwrap(), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());
    }
}
