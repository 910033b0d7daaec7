// ViewerContext Middleware - turns the provider-issued identity into a ViewerContext
// and injects it into request extensions

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::UserId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::cache::ProfileCache;
use crate::infrastructure::viewer::ViewerContext;

/// Application state that can resolve a user id to a profile
pub trait HasProfileLookup {
    fn profile_cache(&self) -> &ProfileCache;
}

/// Authentication information extracted from request headers
#[derive(Debug, Clone, PartialEq)]
enum AuthInfo {
    Bearer(UserId),
    Anonymous,
}

pub async fn viewer_context_middleware<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    T: HasProfileLookup + Clone + Send + Sync + 'static,
{
    let auth_info = extract_auth_from_request(request.headers())?;
    let request_id = format!("req-{}", Uuid::new_v4());

    let viewer_context = match auth_info {
        AuthInfo::Bearer(user_id) => match app_state.profile_cache().get(user_id).await? {
            Some(profile) => ViewerContext::authenticated(&profile, request_id),
            None => {
                warn!("Bearer token names unknown user {}", user_id);
                return Err(AppError::Unauthorized(format!("Unknown user {}", user_id)));
            }
        },
        AuthInfo::Anonymous => ViewerContext::anonymous(request_id),
    };

    debug!(
        "{} viewer={:?} {} {}",
        viewer_context.request_id,
        viewer_context.user_id,
        request.method(),
        request.uri().path()
    );

    request.extensions_mut().insert(Arc::new(viewer_context));
    Ok(next.run(request).await)
}

/// `Authorization: Bearer <user uuid>`; the identity provider has already authenticated
/// the caller, so the token is the opaque user id.
fn extract_auth_from_request(headers: &HeaderMap) -> AppResult<AuthInfo> {
    let Some(auth_header) = headers.get("authorization") else {
        return Ok(AuthInfo::Anonymous);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::BadRequest("Authorization header is not valid text".to_string()))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) => token
            .parse::<UserId>()
            .map(AuthInfo::Bearer)
            .map_err(|_| AppError::Unauthorized("Bearer token is not a user id".to_string())),
        None => Err(AppError::Unauthorized(
            "Unsupported authorization scheme".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_auth_bearer_token() {
        let id = UserId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", id)).unwrap(),
        );
        assert_eq!(extract_auth_from_request(&headers).unwrap(), AuthInfo::Bearer(id));
    }

    #[test]
    fn test_extract_auth_rejects_garbage_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer token123"));
        assert!(matches!(
            extract_auth_from_request(&headers),
            Err(AppError::Unauthorized(_))
        ));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_auth_from_request(&headers).is_err());
    }

    #[test]
    fn test_extract_auth_anonymous() {
        let headers = HeaderMap::new();
        assert_eq!(extract_auth_from_request(&headers).unwrap(), AuthInfo::Anonymous);
    }
}
