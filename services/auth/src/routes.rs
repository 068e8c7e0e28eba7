//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use common::session::UserSession;
use rand::{Rng, distributions::Alphanumeric};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    AppState,
    error::AuthError,
    middleware::auth_middleware,
    models::{Credentials, NewUser, UserResponse},
    repositories::user::normalize_email,
    session::SessionEvent,
    validation::{validate_email, validate_password},
};

/// Reset tokens stay valid for one hour
pub const RESET_TOKEN_TTL_SECONDS: u64 = 3600;

pub const RESET_SENT_MESSAGE: &str = "Password reset email sent. Check your inbox.";

/// Request carrying a refresh token
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
}

fn reset_key(token: &str) -> String {
    format!("password_reset:{}", token)
}

fn login_key(email: &str) -> String {
    format!("login:{}", normalize_email(email))
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/me", get(me))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/logout", post(logout))
        .route("/auth/password-reset", post(request_password_reset))
        .route("/auth/password-reset/confirm", post(confirm_password_reset))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// Register a new account and sign it in
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> Result<impl IntoResponse, AuthError> {
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;
    info!("Sign-up attempt for {}", normalize_email(&payload.email));

    let user = state
        .user_repository
        .create(&payload)
        .await?
        .ok_or(AuthError::EmailTaken)?;

    let tokens = state.session_manager.create_session(&user).await?;
    state
        .events
        .publish(SessionEvent::SignedIn(UserSession::new(user.id, user.email.clone())));

    Ok((StatusCode::CREATED, Json(tokens)))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> Result<impl IntoResponse, AuthError> {
    validate_email(&payload.email)?;

    let key = login_key(&payload.email);
    if !state.rate_limiter.is_allowed(&key).await {
        warn!("Rate limited sign-in for {}", key);
        return Err(AuthError::RateLimited);
    }

    let user = state
        .user_repository
        .find_by_email(&payload.email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !state
        .user_repository
        .verify_password(&user, &payload.password)
        .await?
    {
        info!("Wrong password for user {}", user.id);
        return Err(AuthError::InvalidCredentials);
    }

    state.rate_limiter.reset(&key).await;
    let tokens = state.session_manager.create_session(&user).await?;
    state
        .events
        .publish(SessionEvent::SignedIn(UserSession::new(user.id, user.email.clone())));

    Ok((StatusCode::OK, Json(tokens)))
}

/// Refresh token endpoint, rotates the refresh token
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Token refresh request");

    let user_id = state
        .session_manager
        .refresh_token_owner(&payload.refresh_token)
        .await?;
    let user = state
        .user_repository
        .find_by_id(user_id)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    let tokens = state
        .session_manager
        .refresh(&payload.refresh_token, &user)
        .await?;

    Ok((StatusCode::OK, Json(tokens)))
}

/// Logout endpoint
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Logout request");

    let user_id = state.session_manager.end_session(&payload.refresh_token).await?;
    state.events.publish(SessionEvent::SignedOut(user_id));

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Logged out successfully"})),
    ))
}

/// Issue a reset token when the account exists; the answer is the same
/// either way so emails cannot be probed
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, AuthError> {
    validate_email(&payload.email)?;

    if let Some(user) = state.user_repository.find_by_email(&payload.email).await? {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(48)
            .map(char::from)
            .collect();

        state
            .redis_pool
            .set(
                &reset_key(&token),
                &user.id.to_string(),
                Some(RESET_TOKEN_TTL_SECONDS),
            )
            .await?;

        // No mail transport is wired; the link is handed to the log sink.
        info!(
            target: "auth::mailer",
            "Password reset for {}: {}?token={}",
            user.email, state.reset_url, token
        );
    } else {
        info!("Password reset requested for unknown email");
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"message": RESET_SENT_MESSAGE})),
    ))
}

/// Set a new password with a reset token; the token works once
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetConfirm>,
) -> Result<impl IntoResponse, AuthError> {
    validate_password(&payload.new_password)?;

    let user_id = state
        .redis_pool
        .take(&reset_key(&payload.token))
        .await?
        .and_then(|id| id.parse().ok())
        .ok_or(AuthError::InvalidResetToken)?;

    if !state
        .user_repository
        .update_password(user_id, &payload.new_password)
        .await?
    {
        return Err(AuthError::InvalidResetToken);
    }

    state.session_manager.delete_session(user_id).await?;
    state.events.publish(SessionEvent::SignedOut(user_id));

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Password updated"})),
    ))
}

/// Account behind the presented access token
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state
        .user_repository
        .find_by_id(session.id)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    Ok(Json(UserResponse::from(&user)))
}
