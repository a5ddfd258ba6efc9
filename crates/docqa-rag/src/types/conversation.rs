//! Conversation turns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::Chunk;

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering history into a prompt
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    /// Passages the answer was grounded on (empty for user turns)
    pub sources: Vec<Chunk>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            sources: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>, sources: Vec<Chunk>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            sources,
            created_at: Utc::now(),
        }
    }
}
