//! Gemini generative-language API integration
//!
//! Provides the [`LanguageModel`](crate::LanguageModel) used for relevance
//! judgments.

mod client;

pub use client::GeminiClient;

/// Gemini API request and response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// `generateContent` request body
    #[derive(Debug, Serialize)]
    pub struct GenerateContentRequest {
        pub contents: Vec<Content>,
    }

    impl GenerateContentRequest {
        /// A single-turn request carrying one text prompt
        pub fn from_prompt(prompt: &str) -> Self {
            Self {
                contents: vec![Content {
                    parts: vec![Part {
                        text: Some(prompt.to_string()),
                    }],
                }],
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Content {
        #[serde(default)]
        pub parts: Vec<Part>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Part {
        pub text: Option<String>,
    }

    /// `generateContent` response body
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GenerateContentResponse {
        #[serde(default)]
        pub candidates: Vec<Candidate>,
    }

    impl GenerateContentResponse {
        /// Text of the first part of the first candidate
        pub fn first_text(&self) -> Option<&str> {
            self.candidates
                .first()?
                .content
                .as_ref()?
                .parts
                .first()?
                .text
                .as_deref()
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Candidate {
        pub content: Option<Content>,
        pub finish_reason: Option<String>,
    }
}
