use alloc::string::String;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

/// A single line of a tutoring conversation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self { role: Role::Human, content: content.into() }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self { role: Role::Ai, content: content.into() }
    }
}
