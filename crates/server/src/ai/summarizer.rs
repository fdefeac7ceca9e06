//! Turns the final SQL result into a plain-English answer

use std::sync::Arc;

use trialqa_core::{PromptTemplate, SqlResult};

use super::client::{LanguageModel, LlmError};

const VERIFIED_NOTE: &str = "The result was checked and judged to answer the question.";
const UNVERIFIED_NOTE: &str = "The result could not be confirmed to answer the question. Answer from it anyway, and say briefly that the answer may be incomplete.";

pub struct Summarizer {
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
}

impl Summarizer {
    pub fn new(model: Arc<dyn LanguageModel>, template: PromptTemplate) -> Self {
        Self { model, template }
    }

    /// Summarize `result` as an answer to `question`. Not retried.
    pub async fn summarize(
        &self,
        question: &str,
        result: &SqlResult,
        verified: bool,
    ) -> Result<String, LlmError> {
        let rendered = result.render_for_prompt();
        let prompt = self.template.render(&[
            ("question", question),
            ("sql", result.sql_for_prompt()),
            ("result", rendered.as_str()),
            (
                "verification",
                if verified { VERIFIED_NOTE } else { UNVERIFIED_NOTE },
            ),
        ])?;

        let reply = self.model.complete(&prompt).await?;
        let answer = reply.trim();
        if answer.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::{ScriptedModel, test_prompts};
    use trialqa_core::{PromptStage, SqlFailure, SqlFailureKind};

    #[tokio::test]
    async fn empty_result_is_still_summarized() {
        let model = ScriptedModel::new().always(PromptStage::Summarize, " No matching records were found. ");
        let summarizer = Summarizer::new(model.clone(), test_prompts().summarize);
        let result = SqlResult::failed(
            Some("SELECT 1 FROM dual".into()),
            SqlFailure::new(SqlFailureKind::EmptyResult, ""),
        );

        let answer = summarizer.summarize("q", &result, false).await.unwrap();
        assert_eq!(answer, "No matching records were found.");

        let prompt = &model.prompts(PromptStage::Summarize)[0];
        assert!(prompt.contains("|| SELECT 1 FROM dual || NONE ||"));
        assert!(prompt.ends_with(UNVERIFIED_NOTE));
    }

    #[tokio::test]
    async fn model_failure_is_returned() {
        let model = ScriptedModel::new().then(PromptStage::Summarize, Err(LlmError::Timeout));
        let summarizer = Summarizer::new(model, test_prompts().summarize);
        let result = SqlResult::rows("SELECT 1 FROM dual", Vec::new(), "1");
        assert_eq!(
            summarizer.summarize("q", &result, true).await.unwrap_err(),
            LlmError::Timeout
        );
    }
}
