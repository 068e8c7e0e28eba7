//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

use crate::error::AuthError;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Validate email
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::Validation("Email is required".to_string()));
    }

    if email.len() > 254 {
        return Err(AuthError::Validation(
            "Email must be at most 254 characters long".to_string(),
        ));
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err(AuthError::Validation("Invalid email format".to_string()));
    }

    Ok(())
}

/// Validate password length, counted in characters
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len == 0 {
        return Err(AuthError::Validation("Password is required".to_string()));
    }

    if len < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }

    if len > MAX_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at most {} characters long",
            MAX_PASSWORD_LEN
        )));
    }

    Ok(())
}
