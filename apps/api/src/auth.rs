use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;

/// Header carrying the opaque user id, set by the upstream identity layer.
const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for the already-authenticated user id.
///
/// Token validation happens upstream; this service only trusts the header
/// the identity layer attaches. A missing or malformed header is rejected
/// as unauthorized without further detail.
pub struct AuthenticatedUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;
        let user_id = Uuid::parse_str(header.trim()).map_err(|_| AppError::Unauthorized)?;
        Ok(AuthenticatedUser(user_id))
    }
}
