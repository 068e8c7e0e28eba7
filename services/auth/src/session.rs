//! Session management using Redis, plus the session-changed event stream

use anyhow::Result;
use common::cache::RedisPool;
use common::session::UserSession;
use common::token::{Claims, TokenType};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{error::AuthError, jwt::JwtService, models::User};

/// Token pair handed out on sign-in and refresh
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Sign-in state change of a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(UserSession),
    SignedOut(Uuid),
}

/// Broadcasts session changes to every subscriber
#[derive(Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Nobody listening is fine
    pub fn publish(&self, event: SessionEvent) {
        if self.sender.send(event).is_err() {
            debug!("No subscribers for session event");
        }
    }
}

fn session_key(user_id: Uuid) -> String {
    format!("session:{}", user_id)
}

/// Claims of a correctly signed, unexpired refresh token
fn refresh_claims(jwt_service: &JwtService, refresh_token: &str) -> Result<Claims, AuthError> {
    let claims = jwt_service
        .validate_token(refresh_token)
        .map_err(|_| AuthError::Unauthorized)?;

    if claims.token_type != TokenType::Refresh {
        return Err(AuthError::Unauthorized);
    }

    Ok(claims)
}

/// A rotated-out or revoked refresh token no longer speaks for the session
fn ensure_current(refresh_token: &str, blacklisted: bool, current: Option<&str>) -> Result<(), AuthError> {
    if blacklisted || current != Some(refresh_token) {
        return Err(AuthError::Unauthorized);
    }
    Ok(())
}

/// Session manager for handling user sessions in Redis
///
/// One refresh token per user is live at a time; refreshing rotates it and
/// blacklists the old one.
#[derive(Clone)]
pub struct SessionManager {
    redis_pool: RedisPool,
    jwt_service: JwtService,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(redis_pool: RedisPool, jwt_service: JwtService) -> Self {
        Self {
            redis_pool,
            jwt_service,
        }
    }

    fn issue(&self, user: &User) -> Result<TokenResponse> {
        Ok(TokenResponse {
            access_token: self.jwt_service.generate_access_token(user)?,
            refresh_token: self.jwt_service.generate_refresh_token(user)?,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expiry(),
        })
    }

    /// Create a new session for a user
    pub async fn create_session(&self, user: &User) -> Result<TokenResponse> {
        info!("Creating session for user: {}", user.id);

        let tokens = self.issue(user)?;
        self.redis_pool
            .set(
                &session_key(user.id),
                &tokens.refresh_token,
                Some(self.jwt_service.refresh_token_expiry()),
            )
            .await?;

        Ok(tokens)
    }

    /// Exchange a live refresh token for a new token pair
    pub async fn refresh(&self, refresh_token: &str, user: &User) -> Result<TokenResponse, AuthError> {
        let claims = self.live_refresh_claims(refresh_token).await?;
        if claims.sub != user.id {
            return Err(AuthError::Unauthorized);
        }

        self.jwt_service
            .blacklist_token(&self.redis_pool, &claims, refresh_token)
            .await?;
        Ok(self.create_session(user).await?)
    }

    /// User id behind a refresh token that is valid, not revoked and still
    /// the current one for its user
    pub async fn refresh_token_owner(&self, refresh_token: &str) -> Result<Uuid, AuthError> {
        Ok(self.live_refresh_claims(refresh_token).await?.sub)
    }

    async fn live_refresh_claims(&self, refresh_token: &str) -> Result<Claims, AuthError> {
        let claims = refresh_claims(&self.jwt_service, refresh_token)?;

        let blacklisted = self
            .jwt_service
            .is_token_blacklisted(&self.redis_pool, refresh_token)
            .await?;
        let current = self.redis_pool.get(&session_key(claims.sub)).await?;
        ensure_current(refresh_token, blacklisted, current.as_deref())?;

        Ok(claims)
    }

    /// Revoke the session a refresh token belongs to; only the current,
    /// unrevoked refresh token may end it
    pub async fn end_session(&self, refresh_token: &str) -> Result<Uuid, AuthError> {
        let claims = self.live_refresh_claims(refresh_token).await?;

        info!("Deleting session for user: {}", claims.sub);
        self.jwt_service
            .blacklist_token(&self.redis_pool, &claims, refresh_token)
            .await?;
        self.redis_pool.delete(&session_key(claims.sub)).await?;

        Ok(claims.sub)
    }

    /// Drop the session of a user regardless of the token, used after a
    /// password reset
    pub async fn delete_session(&self, user_id: Uuid) -> Result<()> {
        info!("Deleting session for user: {}", user_id);
        self.redis_pool.delete(&session_key(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::tests::{test_service, test_user};

    #[tokio::test]
    async fn test_events_reach_every_subscriber() {
        let events = SessionEvents::new(8);
        let mut first = events.subscribe();
        let mut second = events.subscribe();
        let session = UserSession::new(Uuid::new_v4(), "owner@example.com");

        events.publish(SessionEvent::SignedIn(session.clone()));
        events.publish(SessionEvent::SignedOut(session.id));

        for receiver in [&mut first, &mut second] {
            assert_eq!(
                receiver.recv().await.unwrap(),
                SessionEvent::SignedIn(session.clone())
            );
            assert_eq!(
                receiver.recv().await.unwrap(),
                SessionEvent::SignedOut(session.id)
            );
        }
    }

    #[test]
    fn test_rotated_out_token_cannot_end_session() {
        let service = test_service();
        let user = test_user();
        let old = service.generate_refresh_token(&user).unwrap();
        let new = service.generate_refresh_token(&user).unwrap();

        // after rotation the old token is blacklisted and the new one stored
        assert!(refresh_claims(&service, &old).is_ok());
        assert!(matches!(
            ensure_current(&old, true, Some(&new)),
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            ensure_current(&old, false, Some(&new)),
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            ensure_current(&new, false, None),
            Err(AuthError::Unauthorized)
        ));
        assert!(ensure_current(&new, false, Some(&new)).is_ok());
    }

    #[test]
    fn test_access_token_is_not_a_refresh_token() {
        let service = test_service();
        let access = service.generate_access_token(&test_user()).unwrap();
        assert!(matches!(
            refresh_claims(&service, &access),
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            refresh_claims(&service, "not-a-jwt"),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn test_publish_without_subscribers() {
        SessionEvents::new(1).publish(SessionEvent::SignedOut(Uuid::new_v4()));
    }
}
