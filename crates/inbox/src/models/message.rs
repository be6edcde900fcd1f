//! Message model as resolved from the mail service

use serde::{Deserialize, Serialize};

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One node of a message's MIME tree
///
/// A leaf carries transport-encoded `data` (URL-safe base64); a multipart
/// node carries child `parts`. Gmail may send both shapes at the root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePart {
    /// MIME type of this part (e.g., "text/plain", "multipart/alternative")
    pub mime_type: Option<String>,
    /// URL-safe base64 body data, if this part has an inline body
    pub data: Option<String>,
    /// Nested parts, in the order the service returned them
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    /// A leaf part with an encoded body
    pub fn leaf(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            data: Some(data.into()),
            parts: Vec::new(),
        }
    }

    /// A container part holding nested parts
    pub fn multipart(mime_type: impl Into<String>, parts: Vec<MessagePart>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            data: None,
            parts,
        }
    }

    /// Whether this part declares exactly the given MIME type
    pub fn is_mime(&self, mime_type: &str) -> bool {
        self.mime_type.as_deref() == Some(mime_type)
    }

    pub fn has_parts(&self) -> bool {
        !self.parts.is_empty()
    }
}

/// A fully resolved message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Gmail message ID
    pub id: MessageId,
    /// Short plain preview supplied by the service
    pub snippet: String,
    /// Root of the body structure
    pub payload: MessagePart,
}

impl Message {
    pub fn new(id: impl Into<MessageId>, snippet: impl Into<String>, payload: MessagePart) -> Self {
        Self {
            id: id.into(),
            snippet: snippet.into(),
            payload,
        }
    }
}

/// One page of the mailbox listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePage {
    /// Message references in listing order
    pub refs: Vec<MessageId>,
    /// Cursor for the next page; `None` ends pagination
    pub next_page_token: Option<String>,
}
