//! Rewords a normalized question into a short, SQL-friendly form

use std::sync::Arc;

use trialqa_core::PromptTemplate;

use super::client::{LanguageModel, LlmError};
use super::clean_question;

pub struct Simplifier {
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    dictionary: String,
}

impl Simplifier {
    pub fn new(model: Arc<dyn LanguageModel>, template: PromptTemplate, dictionary: String) -> Self {
        Self {
            model,
            template,
            dictionary,
        }
    }

    /// One simplification attempt. Blank model output is an
    /// [`LlmError::EmptyResponse`] so the caller can retry.
    pub async fn simplify(&self, question: &str) -> Result<String, LlmError> {
        let prompt = self.template.render(&[
            ("question", question),
            ("dictionary", self.dictionary.as_str()),
        ])?;
        let reply = self.model.complete(&prompt).await?;
        clean_question(&reply).ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::{ScriptedModel, test_prompts};
    use trialqa_core::PromptStage;

    #[tokio::test]
    async fn returns_cleaned_rewording() {
        let model = ScriptedModel::new().always(
            PromptStage::Simplify,
            "Reworded Question: \"List Subject IDs with DM2 who discontinued treatment.\"",
        );
        let simplifier = Simplifier::new(model.clone(), test_prompts().simplify, String::new());

        let out = simplifier
            .simplify("subjects with DM2 who discontinued treatment")
            .await
            .unwrap();
        assert_eq!(out, "List Subject IDs with DM2 who discontinued treatment.");
        assert_eq!(
            model.prompts(PromptStage::Simplify),
            vec!["SIMPLIFY subjects with DM2 who discontinued treatment"]
        );
    }

    #[tokio::test]
    async fn blank_output_is_an_error() {
        let model = ScriptedModel::new().always(PromptStage::Simplify, "   \n");
        let simplifier = Simplifier::new(model, test_prompts().simplify, String::new());
        assert_eq!(
            simplifier.simplify("anything").await.unwrap_err(),
            LlmError::EmptyResponse
        );
    }
}
