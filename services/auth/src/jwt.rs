//! JWT service for token generation, validation, and management
//!
//! Tokens are signed with RS256. The API service only holds the public key
//! and verifies access tokens on its own; refresh tokens never leave this
//! service's validation path.

use anyhow::Result;
use common::cache::RedisPool;
use common::token::{Claims, TokenType, load_pem};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::models::User;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Private key for signing tokens
    pub private_key: String,
    /// Public key for verifying tokens
    pub public_key: String,
    /// Access token expiration time in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_PRIVATE_KEY`: Private key for signing tokens (PEM format) or path to private key file
    /// - `JWT_PUBLIC_KEY`: Public key for verifying tokens (PEM format) or path to public key file
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 900)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let private_key = load_pem("JWT_PRIVATE_KEY")?;
        let public_key = load_pem("JWT_PUBLIC_KEY")?;

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "900".to_string()) // 15 minutes
            .parse()
            .unwrap_or(900);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "604800".to_string()) // 7 days
            .parse()
            .unwrap_or(604800);

        Ok(JwtConfig {
            private_key,
            public_key,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}

fn now_secs() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
        .as_secs())
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(config.private_key.as_bytes())?;
        let decoding_key = DecodingKey::from_rsa_pem(config.public_key.as_bytes())?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        Ok(JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    fn generate(&self, user: &User, token_type: TokenType, ttl: u64) -> Result<String> {
        let now = now_secs()?;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            jti: Uuid::new_v4(),
            iat: now,
            exp: now + ttl,
            token_type,
        };

        Ok(encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Generate an access token for a user
    pub fn generate_access_token(&self, user: &User) -> Result<String> {
        self.generate(user, TokenType::Access, self.config.access_token_expiry)
    }

    /// Generate a refresh token for a user
    pub fn generate_refresh_token(&self, user: &User) -> Result<String> {
        self.generate(user, TokenType::Refresh, self.config.refresh_token_expiry)
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Check if a token is blacklisted in Redis
    pub async fn is_token_blacklisted(&self, redis_pool: &RedisPool, token: &str) -> Result<bool> {
        let key = format!("blacklisted_token:{}", token);
        let result = redis_pool.get(&key).await?;
        Ok(result.is_some())
    }

    /// Blacklist a token in Redis for the rest of its lifetime
    pub async fn blacklist_token(&self, redis_pool: &RedisPool, claims: &Claims, token: &str) -> Result<()> {
        let key = format!("blacklisted_token:{}", token);
        let remaining = claims.exp.saturating_sub(now_secs()?).max(1);
        redis_pool.set(&key, "1", Some(remaining)).await?;
        Ok(())
    }

    /// Get the access token expiry time
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    /// Get the refresh token expiry time
    pub fn refresh_token_expiry(&self) -> u64 {
        self.config.refresh_token_expiry
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub fn test_service() -> JwtService {
        JwtService::new(JwtConfig {
            private_key: include_str!("../../../keys/test_private.pem").to_string(),
            public_key: include_str!("../../../keys/test_public.pem").to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 3600,
        })
        .unwrap()
    }

    pub fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "owner@example.com".to_string(),
            password_hash: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = test_service();
        let user = test_user();

        let claims = service
            .validate_token(&service.generate_access_token(&user).unwrap())
            .unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_tokens_are_unique() {
        let service = test_service();
        let user = test_user();

        let first = service.generate_refresh_token(&user).unwrap();
        let second = service.generate_refresh_token(&user).unwrap();
        assert_ne!(first, second);
        assert_eq!(
            service.validate_token(&first).unwrap().token_type,
            TokenType::Refresh
        );
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let service = test_service();
        let mut token = service.generate_access_token(&test_user()).unwrap();
        token.push('x');
        assert!(service.validate_token(&token).is_err());
    }
}
