//! Middleware for JWT token validation and authentication

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use common::token::TokenType;
use tracing::error;

use crate::{AppState, error::AuthError};

/// Require a valid access token and expose its `UserSession` to handlers
///
/// Access tokens are short lived and never revoked; logout revokes the
/// refresh token, so this check needs no Redis lookup.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AuthError::Unauthorized)?;
    let token = bearer.token();

    let claims = state.jwt_service.validate_token(token).map_err(|e| {
        error!("Failed to validate token: {}", e);
        AuthError::Unauthorized
    })?;

    if claims.token_type != TokenType::Access {
        return Err(AuthError::Unauthorized);
    }

    req.extensions_mut().insert(claims.session());

    Ok(next.run(req).await)
}
