//! Authentication middleware for JWT token validation

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use common::token::{Claims, TokenType, load_pem};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tracing::{debug, error};

use crate::{error::ApiError, state::AppState};

/// Verifies access tokens issued by the auth service
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(public_key_pem: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    /// Build from `JWT_PUBLIC_KEY`, PEM text or a path to it
    pub fn from_env() -> anyhow::Result<Self> {
        let pem = load_pem("JWT_PUBLIC_KEY")?;
        Ok(Self::new(&pem)?)
    }

    /// Claims of a valid, unexpired access token
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!("Rejected token: {}", e);
                ApiError::Unauthorized
            })?
            .claims;

        if claims.token_type != TokenType::Access {
            error!("Refresh token presented as access token for {}", claims.sub);
            return Err(ApiError::Unauthorized);
        }

        Ok(claims)
    }
}

/// Authentication middleware
///
/// The user session is taken from the verified token only and inserted into
/// the request extensions for the handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(ApiError::Unauthorized)?;
    let claims = state.verifier.verify(bearer.token())?;

    req.extensions_mut().insert(claims.session());

    Ok(next.run(req).await)
}
