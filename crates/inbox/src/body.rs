//! Plaintext body extraction
//!
//! Gmail delivers bodies as URL-safe base64 with optional padding. The
//! plaintext body is the first `text/plain` part found by a depth-first
//! walk of the MIME tree; a message without parts is decoded directly
//! when its inline body is plaintext.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use log::debug;

use crate::models::{Message, MessagePart};

const TEXT_PLAIN: &str = "text/plain";

/// Standard alphabet, padding optional
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Extract the decoded plaintext body of a message
///
/// Returns `None` when the message has no plaintext part (HTML-only or
/// binary messages); this is an expected outcome, not an error.
pub fn extract_plain_text(message: &Message) -> Option<String> {
    let payload = &message.payload;

    if payload.has_parts() {
        return find_plain_text_in_parts(&payload.parts);
    }

    let is_plain = payload.mime_type.is_none() || payload.is_mime(TEXT_PLAIN);
    match payload.data.as_deref() {
        Some(data) if is_plain => decode_body(data),
        _ => None,
    }
}

/// Depth-first, in-order search for the first decodable text/plain part
fn find_plain_text_in_parts(parts: &[MessagePart]) -> Option<String> {
    for part in parts {
        if part.is_mime(TEXT_PLAIN)
            && let Some(data) = part.data.as_deref()
            && let Some(text) = decode_body(data)
        {
            return Some(text);
        }

        if part.has_parts()
            && let Some(text) = find_plain_text_in_parts(&part.parts)
        {
            return Some(text);
        }
    }

    None
}

/// Decode URL-safe base64 body data to text
///
/// Translates `-` to `+` and `_` to `/`, then decodes with the standard
/// alphabet. Bytes that are not valid UTF-8 are replaced.
pub fn decode_body(data: &str) -> Option<String> {
    let standard: String = data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    match LENIENT_STANDARD.decode(standard.as_bytes()) {
        Ok(bytes) => Some(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }),
        Err(e) => {
            debug!("Skipping undecodable body data: {}", e);
            None
        }
    }
}
