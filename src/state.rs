//! Conversation data types
//!
//! These structures are both what the transcript holds and what goes over the
//! wire to the query backend, so their serde shape is part of the backend
//! contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    /// Query the backend generated for the preceding user turn
    #[serde(rename = "cypher_query", default, skip_serializing_if = "Option::is_none")]
    pub structured_query: Option<String>,
    /// Raw rows the backend returned alongside its explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
}

/// The role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            structured_query: None,
            results: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            structured_query: None,
            results: None,
        }
    }

    /// Diagnostic turn for a failed submission
    pub fn error(description: impl std::fmt::Display) -> Self {
        Self::assistant(format!("Error: {}", description))
    }
}
