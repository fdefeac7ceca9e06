//! The refinement loop: simplify, execute, judge, refine, summarize
//!
//! ```text
//! Simplifying -> Executing -> Judging -> Accepted
//!                   ^  |         |
//!                   |  v         v
//!                 Refining <-----+ (until max_iterations -> Exhausted)
//! ```
//!
//! One iteration is one gateway execution. A gateway result that failed
//! (no SQL, SQL error, no rows) skips the judge and goes straight to
//! refinement. Whatever state the loop ends in, the last result is
//! summarized; exhausted answers are marked as not accepted.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use trialqa_core::question::comparable;
use trialqa_core::{
    Answer, Attempt, ExhaustionReason, LoopStatus, PromptSet, Question, QuestionOrigin,
    SqlFailure, SqlFailureKind, SqlResult, TermNormalizer, Verdict,
};
use uuid::Uuid;

use super::client::{LanguageModel, LlmError};
use super::judge::{LlmJudge, ResultJudge};
use super::refiner::{RefineRequest, Refiner};
use super::simplifier::Simplifier;
use super::summarizer::Summarizer;
use crate::config::PipelineConfig;
use crate::gateway::{GatewayError, SqlGateway};

/// Request-level failures. Everything else ends in an [`Answer`].
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("SQL service timed out")]
    GatewayTimeout,

    #[error("SQL service unavailable: {0}")]
    GatewayUnavailable(GatewayError),

    #[error("Failed to summarize the result: {0}")]
    Summarization(LlmError),
}

/// Loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Simplifying,
    Executing,
    Judging,
    Refining,
    Accepted,
    Exhausted(ExhaustionReason),
}

/// Per-request state; never shared between requests
struct IterationState {
    query_id: Uuid,
    iteration: u32,
    question: Question,
    last_result: Option<SqlResult>,
    last_verdict: Option<Verdict>,
    feedback: String,
    history: Vec<String>,
    attempts: Vec<Attempt>,
}

/// Answers questions about trial data.
///
/// Holds only shared, read-only handles, so one instance serves any number
/// of concurrent requests.
pub struct Assistant {
    gateway: Arc<dyn SqlGateway>,
    judge: Option<Arc<dyn ResultJudge>>,
    normalizer: Arc<TermNormalizer>,
    simplifier: Simplifier,
    refiner: Refiner,
    summarizer: Summarizer,
    settings: PipelineConfig,
}

impl Assistant {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        gateway: Arc<dyn SqlGateway>,
        normalizer: Arc<TermNormalizer>,
        prompts: &PromptSet,
        settings: PipelineConfig,
    ) -> Self {
        let dictionary = normalizer.dictionary_text();
        let judge: Option<Arc<dyn ResultJudge>> = settings.judge_enabled.then(|| {
            Arc::new(LlmJudge::new(model.clone(), prompts.judge.clone())) as Arc<dyn ResultJudge>
        });

        Self {
            gateway,
            judge,
            normalizer,
            simplifier: Simplifier::new(model.clone(), prompts.simplify.clone(), dictionary.clone()),
            refiner: Refiner::new(model.clone(), prompts.refine.clone(), dictionary),
            summarizer: Summarizer::new(model, prompts.summarize.clone()),
            settings,
        }
    }

    /// Replace the judge; `None` accepts every successful execution
    pub fn with_judge(mut self, judge: Option<Arc<dyn ResultJudge>>) -> Self {
        self.judge = judge;
        self
    }

    fn max_iterations(&self) -> u32 {
        self.settings.max_iterations.max(1)
    }

    /// Answer one user question
    pub async fn ask(&self, question: &str) -> Result<Answer, AssistantError> {
        let original = question.trim();
        if original.is_empty() {
            return Err(AssistantError::EmptyQuestion);
        }

        let query_id = Uuid::new_v4();
        let normalized = self.normalizer.normalize(original);
        tracing::info!(%query_id, question = %original, normalized = %normalized, "Question received");

        let mut st = IterationState {
            query_id,
            iteration: 0,
            question: Question::new(original, normalized.clone(), QuestionOrigin::User, 0),
            last_result: None,
            last_verdict: None,
            feedback: String::new(),
            history: Vec::new(),
            attempts: Vec::new(),
        };

        let mut state = LoopState::Simplifying;
        loop {
            let next = match state {
                LoopState::Simplifying => {
                    st.question = self.simplify(&normalized).await;
                    LoopState::Executing
                }
                LoopState::Executing => self.execute(&mut st).await?,
                LoopState::Judging => self.judge(original, &mut st).await,
                LoopState::Refining => match self.next_question(original, &st).await {
                    Some(question) => {
                        st.question = question;
                        LoopState::Executing
                    }
                    None => LoopState::Exhausted(ExhaustionReason::RefinementStalled),
                },
                LoopState::Accepted | LoopState::Exhausted(_) => break,
            };
            tracing::debug!(
                query_id = %st.query_id,
                iteration = st.iteration,
                from = ?state,
                to = ?next,
                "Loop transition"
            );
            state = next;
        }

        let (status, exhaustion) = match state {
            LoopState::Exhausted(reason) => (LoopStatus::Exhausted, Some(reason)),
            _ => (LoopStatus::Accepted, None),
        };
        if let Some(reason) = exhaustion {
            tracing::warn!(
                %query_id,
                iterations = st.iteration,
                reason = ?reason,
                "No result accepted, summarizing the last result"
            );
        }

        let result = st.last_result.take().unwrap_or_else(|| {
            SqlResult::failed(None, SqlFailure::new(SqlFailureKind::EmptyResult, ""))
        });
        let answer = self
            .summarizer
            .summarize(original, &result, status == LoopStatus::Accepted)
            .await
            .map_err(|e| {
                tracing::error!(%query_id, error = %e, "Summarization failed");
                AssistantError::Summarization(e)
            })?;

        metrics::counter!("trialqa_questions_total", "status" => status.as_str()).increment(1);
        metrics::histogram!("trialqa_iterations").record(f64::from(st.iteration));
        tracing::info!(
            %query_id,
            iterations = st.iteration,
            status = status.as_str(),
            "Question answered"
        );

        Ok(Answer {
            query_id,
            question: original.to_string(),
            answer,
            iterations: st.iteration,
            accepted: status == LoopStatus::Accepted,
            status,
            exhaustion,
            final_question: st.question.text,
            sql: result.sql,
            question_history: st.history,
            attempts: st.attempts,
        })
    }

    /// Simplifying: retried on model failure, falls back to the normalized text
    async fn simplify(&self, normalized: &str) -> Question {
        for attempt in 0..=self.settings.model_retries {
            match self.simplifier.simplify(normalized).await {
                Ok(text) => {
                    let text = self.normalizer.normalize(&text);
                    return Question::new(text, normalized, QuestionOrigin::Simplified, 0);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Simplifier call failed");
                }
            }
        }
        tracing::warn!("Simplifier unavailable, using the normalized question");
        Question::new(normalized, normalized, QuestionOrigin::Fallback, 0)
    }

    /// Executing: one iteration. Transport failures are retried with the
    /// same question; semantic failures go to refinement.
    async fn execute(&self, st: &mut IterationState) -> Result<LoopState, AssistantError> {
        st.iteration += 1;
        st.history.push(st.question.text.clone());
        let started_at = Utc::now();
        tracing::info!(
            query_id = %st.query_id,
            iteration = st.iteration,
            question = %st.question.text,
            "Executing question"
        );

        let result = self.execute_with_retries(&st.question.text).await?;
        st.last_verdict = None;
        st.attempts
            .push(Attempt::new(st.iteration, &st.question, started_at, &result, None));

        let next = match &result.failure {
            None => LoopState::Judging,
            Some(failure) => {
                tracing::info!(
                    query_id = %st.query_id,
                    iteration = st.iteration,
                    kind = ?failure.kind,
                    message = %failure.message,
                    "Execution failed"
                );
                st.feedback = failure.describe();
                self.after_rejection(st)
            }
        };
        st.last_result = Some(result);
        Ok(next)
    }

    async fn execute_with_retries(&self, question: &str) -> Result<SqlResult, AssistantError> {
        let mut last = GatewayError::Protocol("no attempt made".to_string());
        for attempt in 0..=self.settings.gateway_retries {
            match self.gateway.execute(question).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "SQL gateway call failed");
                    last = e;
                }
            }
        }
        Err(if last.is_timeout() {
            AssistantError::GatewayTimeout
        } else {
            AssistantError::GatewayUnavailable(last)
        })
    }

    /// Judging: positive verdicts accept the current result
    async fn judge(&self, original: &str, st: &mut IterationState) -> LoopState {
        let Some(judge) = &self.judge else {
            return LoopState::Accepted;
        };
        let Some(result) = &st.last_result else {
            return self.after_rejection(st);
        };

        let mut verdict = None;
        for attempt in 0..=self.settings.model_retries {
            match judge.judge(original, result).await {
                Ok(v) => {
                    verdict = Some(v);
                    break;
                }
                Err(e) => tracing::warn!(attempt, error = %e, "Judge call failed"),
            }
        }
        let verdict =
            verdict.unwrap_or_else(|| Verdict::fail_closed("Judge unavailable, result unverified"));

        tracing::info!(
            query_id = %st.query_id,
            iteration = st.iteration,
            satisfied = verdict.satisfied,
            parsed = verdict.parsed,
            rationale = verdict.rationale.as_deref().unwrap_or(""),
            "Judged result"
        );

        if let Some(attempt) = st.attempts.last_mut() {
            attempt.verdict = Some(verdict.clone());
        }
        let satisfied = verdict.satisfied;
        st.feedback = verdict.feedback();
        st.last_verdict = Some(verdict);

        if satisfied {
            LoopState::Accepted
        } else {
            self.after_rejection(st)
        }
    }

    fn after_rejection(&self, st: &IterationState) -> LoopState {
        if st.iteration >= self.max_iterations() {
            LoopState::Exhausted(ExhaustionReason::MaxIterations)
        } else {
            LoopState::Refining
        }
    }

    fn is_new(&self, text: &str, st: &IterationState) -> bool {
        let candidate = comparable(text);
        !candidate.is_empty()
            && !st.question.same_text_as(text)
            && st.history.iter().all(|q| comparable(q) != candidate)
    }

    /// Refining: the judge's suggestion if it is new, else the refiner
    async fn next_question(&self, original: &str, st: &IterationState) -> Option<Question> {
        let next_iteration = st.iteration;

        if let Some(suggested) = st
            .last_verdict
            .as_ref()
            .and_then(|v| v.revised_question.as_deref())
        {
            let text = self.normalizer.normalize(suggested);
            if self.is_new(&text, st) {
                tracing::info!(query_id = %st.query_id, question = %text, "Using judge suggestion");
                return Some(Question::new(
                    text.clone(),
                    text,
                    QuestionOrigin::JudgeSuggestion,
                    next_iteration,
                ));
            }
        }

        let request = RefineRequest {
            original_question: original,
            current_question: &st.question.text,
            feedback: &st.feedback,
            history: &st.history,
        };
        for attempt in 0..=self.settings.model_retries {
            match self.refiner.refine(&request).await {
                Ok(text) => {
                    let text = self.normalizer.normalize(&text);
                    if self.is_new(&text, st) {
                        tracing::info!(query_id = %st.query_id, question = %text, "Refined question");
                        return Some(Question::new(
                            text.clone(),
                            text,
                            QuestionOrigin::Refined,
                            next_iteration,
                        ));
                    }
                    tracing::warn!(attempt, question = %text, "Refiner repeated an earlier question");
                }
                Err(e) => tracing::warn!(attempt, error = %e, "Refiner call failed"),
            }
        }
        None
    }
}
