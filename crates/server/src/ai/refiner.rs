//! Rewrites a question after an attempt that did not answer it

use std::sync::Arc;

use trialqa_core::PromptTemplate;

use super::client::{LanguageModel, LlmError};
use super::clean_question;

/// Everything the refiner is told about the failed attempt
pub struct RefineRequest<'a> {
    pub original_question: &'a str,
    pub current_question: &'a str,
    pub feedback: &'a str,
    pub history: &'a [String],
}

pub struct Refiner {
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    dictionary: String,
}

impl Refiner {
    pub fn new(model: Arc<dyn LanguageModel>, template: PromptTemplate, dictionary: String) -> Self {
        Self {
            model,
            template,
            dictionary,
        }
    }

    /// One refinement attempt. Whether the reply is actually new is for the
    /// caller to decide.
    pub async fn refine(&self, request: &RefineRequest<'_>) -> Result<String, LlmError> {
        let history = if request.history.is_empty() {
            "(none)".to_string()
        } else {
            request
                .history
                .iter()
                .enumerate()
                .map(|(i, q)| format!("{}. {}", i + 1, q))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = self.template.render(&[
            ("question", request.current_question),
            ("original_question", request.original_question),
            ("feedback", request.feedback),
            ("history", history.as_str()),
            ("dictionary", self.dictionary.as_str()),
        ])?;
        let reply = self.model.complete(&prompt).await?;
        clean_question(&reply).ok_or(LlmError::EmptyResponse)
    }
}
