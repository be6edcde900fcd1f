//! Domain models for the search pipeline

mod message;
mod result;

pub use message::{Message, MessageId, MessagePage, MessagePart};
pub use result::{SearchOutcome, SearchResult, SearchStats};
