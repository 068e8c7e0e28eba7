//! Authenticated user session as seen by the diary

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diary::DiaryScope;

/// Identity of a signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub id: Uuid,
    pub email: String,
}

impl UserSession {
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }

    /// Diary scope owned by this session
    pub fn scope(&self) -> DiaryScope {
        DiaryScope::User(self.id)
    }
}
