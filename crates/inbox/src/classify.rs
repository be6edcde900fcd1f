//! Per-message relevance judgment by a language model
//!
//! The classifier embeds the body and the query in a yes/no prompt and
//! reads the model's textual answer. Any failure along the way counts as
//! "not relevant" so one bad call never aborts a search.

use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ClassificationError;

/// Text-in, text-out language model
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for `prompt`
    fn generate(&self, prompt: &str) -> Result<String, ClassificationError>;
}

/// How a model answer is turned into a boolean
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Relevant when the answer contains `true` anywhere (case-sensitive).
    ///
    /// Answers such as "this is not true enough" count as relevant.
    #[default]
    Substring,
    /// Relevant only when the whole answer is `true` (ignoring case and a
    /// trailing period). Changes results compared to `Substring`.
    Strict,
}

impl MatchMode {
    /// Interpret a model answer
    pub fn is_relevant(self, answer: &str) -> bool {
        match self {
            MatchMode::Substring => answer.contains("true"),
            MatchMode::Strict => {
                let answer = answer.trim();
                let answer = answer.strip_suffix('.').unwrap_or(answer);
                answer.eq_ignore_ascii_case("true")
            }
        }
    }
}

/// Build the yes/no relevance prompt for one email
pub fn build_prompt(body: &str, query: &str) -> String {
    format!(
        "Given the email content: \"{}\". Does this email contain information related to: \"{}\"? Answer with \"true\" or \"false\" only.",
        body, query
    )
}

/// Asks a [`LanguageModel`] whether an email body matches a query
#[derive(Clone)]
pub struct RelevanceClassifier {
    model: Arc<dyn LanguageModel>,
    mode: MatchMode,
}

impl RelevanceClassifier {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            mode: MatchMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Classify, reporting failures to the caller
    pub fn try_classify(&self, body: &str, query: &str) -> Result<bool, ClassificationError> {
        if body.is_empty() {
            return Err(ClassificationError::MalformedResponse(
                "empty email body".to_string(),
            ));
        }

        let answer = self.model.generate(&build_prompt(body, query))?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(ClassificationError::MalformedResponse(
                "empty answer".to_string(),
            ));
        }

        Ok(self.mode.is_relevant(answer))
    }

    /// Classify, treating any failure as "not relevant"
    pub fn classify(&self, body: &str, query: &str) -> bool {
        match self.try_classify(body, query) {
            Ok(relevant) => relevant,
            Err(e) => {
                warn!("Classification failed, treating as not relevant: {}", e);
                false
            }
        }
    }
}
