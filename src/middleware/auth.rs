use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::User;
use crate::AppState;

/// Middleware to require a valid access token. The bearer subject must
/// still resolve to a live user, so tokens for deleted accounts stop
/// working even before they expire.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let token = token.ok_or_else(|| {
        AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
    })?;

    let claims = state.jwt.decode_access_token(token)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
        AppError::Unauthorized(anyhow::anyhow!("Could not validate credentials"))
    })?;

    let user = state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Could not validate credentials"))
        })?;

    // Store the resolved user in request extensions so handlers can access it
    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}

/// Extractor to easily get the authenticated user in handlers
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts.extensions.get::<CurrentUser>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Authenticated user missing from request extensions"
            ))
        })?;
        Ok(user.clone())
    }
}
