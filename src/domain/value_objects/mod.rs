use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a broadcast job. Also the namespace prefix of its durable state keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque position in the recipient enumeration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An absent cursor and the literal `0` both mean "from the beginning".
    pub fn is_start(&self) -> bool {
        self.0.is_empty() || self.0 == "0"
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub chat_id: String,
    /// `None` for fixed test recipients, which never move the resume cursor.
    pub cursor: Option<Cursor>,
}

impl Recipient {
    pub fn paged(chat_id: impl Into<String>, cursor: Cursor) -> Self {
        Self {
            chat_id: chat_id.into(),
            cursor: Some(cursor),
        }
    }

    pub fn fixed(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            cursor: None,
        }
    }
}
