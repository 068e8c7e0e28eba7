//! JWT claims shared by the token issuer and the services verifying tokens

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::session::UserSession;

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// Access token
    Access,
    /// Refresh token
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    pub email: String,
    /// Unique token id, two tokens issued in the same second still differ
    pub jti: Uuid,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    pub token_type: TokenType,
}

impl Claims {
    /// Session of the user the token was issued to
    pub fn session(&self) -> UserSession {
        UserSession::new(self.sub, self.email.clone())
    }
}

/// Read a PEM key from environment variable `var`.
///
/// The value is either the PEM text itself or a path to it. Relative paths
/// are tried against the working directory, then against the workspace root.
pub fn load_pem(var: &str) -> Result<String> {
    let value = std::env::var(var).with_context(|| format!("{} environment variable not set", var))?;
    if value.trim_start().starts_with("-----BEGIN") {
        return Ok(value);
    }

    let workspace_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let candidates = [PathBuf::from(&value), workspace_root.join(&value)];
    candidates
        .iter()
        .find_map(|path| std::fs::read_to_string(path).ok())
        .map(|pem| pem.trim().to_string())
        .with_context(|| format!("Failed to read key file {} named by {}", value, var))
}
