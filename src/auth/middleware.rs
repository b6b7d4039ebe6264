use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{
    auth::{
        cookies::{self, ACCESS_COOKIE},
        repo_types::Role,
    },
    error::AuthError,
    state::AppState,
};

/// Identity placed in request extensions by the role gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: i64,
    pub role: Role,
}

pub async fn require_user(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    gate(&state, Role::User, request, next).await
}

pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    gate(&state, Role::Admin, request, next).await
}

async fn gate(
    state: &AppState,
    required: Role,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = cookies::access_token(request.headers());
    let auth = state.auth.authorize(token.as_deref(), required).await?;

    request.extensions_mut().insert(CurrentUser {
        user_id: auth.user_id,
        role: auth.role,
    });
    let mut response = next.run(request).await;

    if let Some(fresh) = auth.refreshed_token {
        match cookies::set_cookie(
            ACCESS_COOKIE,
            &fresh,
            state.auth.access_ttl(),
            state.config.cookies.secure,
        ) {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(e) => warn!(error = %e, "could not encode refreshed access cookie"),
        }
    }
    Ok(response)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .copied()
            .ok_or(AuthError::Unauthorized("not authenticated"))
    }
}
