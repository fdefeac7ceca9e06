//! Decides whether a SQL result answers the user's question

use std::sync::Arc;

use async_trait::async_trait;
use trialqa_core::{PromptTemplate, SqlResult, Verdict};

use super::client::{LanguageModel, LlmError};

/// Judges a result against the question as the user originally asked it
#[async_trait]
pub trait ResultJudge: Send + Sync {
    async fn judge(&self, question: &str, result: &SqlResult) -> Result<Verdict, LlmError>;
}

/// Judge backed by a language model.
///
/// Model errors are returned as errors; replies that carry no recognizable
/// verdict come back as a fail-closed negative verdict.
pub struct LlmJudge {
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
}

impl LlmJudge {
    pub fn new(model: Arc<dyn LanguageModel>, template: PromptTemplate) -> Self {
        Self { model, template }
    }
}

#[async_trait]
impl ResultJudge for LlmJudge {
    async fn judge(&self, question: &str, result: &SqlResult) -> Result<Verdict, LlmError> {
        let rendered = result.render_for_prompt();
        let prompt = self
            .template
            .render(&[("question", question), ("result", rendered.as_str())])?;
        let reply = self.model.complete(&prompt).await?;
        if reply.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        let verdict = Verdict::parse(&reply);
        if !verdict.parsed {
            tracing::warn!(reply = %reply, "Judge reply had no verdict, failing closed");
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::{ScriptedModel, row, test_prompts};
    use serde_json::json;
    use trialqa_core::PromptStage;

    fn result() -> SqlResult {
        SqlResult::rows(
            "SELECT subject_id FROM dm",
            vec![row(json!({"subject_id": 101}))],
            "",
        )
    }

    #[tokio::test]
    async fn sends_question_and_rows() {
        let model = ScriptedModel::new().always(PromptStage::Judge, "Pass");
        let judge = LlmJudge::new(model.clone(), test_prompts().judge);

        let verdict = judge.judge("Which subjects have CAD?", &result()).await.unwrap();
        assert!(verdict.satisfied);
        assert_eq!(
            model.prompts(PromptStage::Judge),
            vec![r#"JUDGE Which subjects have CAD? || [{"subject_id":101}]"#]
        );
    }

    #[tokio::test]
    async fn rambling_reply_fails_closed() {
        let model = ScriptedModel::new().always(PromptStage::Judge, "Honestly it is hard to say.");
        let judge = LlmJudge::new(model, test_prompts().judge);

        let verdict = judge.judge("q", &result()).await.unwrap();
        assert!(!verdict.satisfied);
        assert!(!verdict.parsed);
    }

    #[tokio::test]
    async fn empty_reply_is_an_error() {
        let model = ScriptedModel::new().always(PromptStage::Judge, "");
        let judge = LlmJudge::new(model, test_prompts().judge);
        assert_eq!(
            judge.judge("q", &result()).await.unwrap_err(),
            LlmError::EmptyResponse
        );
    }
}
