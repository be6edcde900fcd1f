//! Gmail API response normalization
//!
//! Converts Gmail API responses to Sift domain models.

use super::api::{GmailMessage, ListMessagesResponse, MessagePart as ApiPart};
use crate::models::{Message, MessageId, MessagePage, MessagePart};

/// Normalize a listing response into a page of message references
pub fn normalize_page(list: ListMessagesResponse) -> MessagePage {
    MessagePage {
        refs: list
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|r| MessageId::new(r.id))
            .collect(),
        next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
    }
}

/// Normalize a Gmail API message to a Sift Message
///
/// A message without a payload normalizes to an empty body, which the
/// body extractor treats as having no plaintext.
pub fn normalize_message(gmail_msg: GmailMessage) -> Message {
    let payload = gmail_msg.payload.map(normalize_part).unwrap_or_default();

    Message {
        id: MessageId::new(gmail_msg.id),
        snippet: decode_html_entities(&gmail_msg.snippet),
        payload,
    }
}

/// Recursively convert an API part tree
fn normalize_part(part: ApiPart) -> MessagePart {
    MessagePart {
        mime_type: part.mime_type,
        data: part.body.and_then(|b| b.data).filter(|d| !d.is_empty()),
        parts: part
            .parts
            .unwrap_or_default()
            .into_iter()
            .map(normalize_part)
            .collect(),
    }
}

/// Decode HTML entities in snippet text
fn decode_html_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
