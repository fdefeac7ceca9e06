//! Outcome of answering one user question

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::question::Question;
use crate::sql_result::{SqlFailureKind, SqlResult};
use crate::verdict::Verdict;

/// How the refinement loop terminated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoopStatus {
    /// A result was judged to answer the question
    Accepted,
    /// No result was accepted; the answer is best-effort
    Exhausted,
}

impl LoopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopStatus::Accepted => "accepted",
            LoopStatus::Exhausted => "exhausted",
        }
    }
}

/// Why the loop gave up without an accepted result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionReason {
    /// The iteration bound was reached
    MaxIterations,
    /// No new wording of the question could be produced
    RefinementStalled,
}

/// Audit record of one iteration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attempt {
    pub iteration: u32,
    pub question: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    pub row_count: usize,
    #[serde(default)]
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<SqlFailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

impl Attempt {
    pub fn new(
        iteration: u32,
        question: &Question,
        started_at: DateTime<Utc>,
        result: &SqlResult,
        verdict: Option<&Verdict>,
    ) -> Self {
        Self {
            iteration,
            question: question.text.clone(),
            started_at,
            sql: result.sql.clone(),
            row_count: result.row_count(),
            truncated: result.truncated,
            failure: result.failure.as_ref().map(|f| f.kind),
            verdict: verdict.cloned(),
        }
    }
}

/// Final answer to a user question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub query_id: Uuid,
    /// Question as the user asked it
    pub question: String,
    pub answer: String,
    pub iterations: u32,
    pub accepted: bool,
    pub status: LoopStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exhaustion: Option<ExhaustionReason>,
    /// Question text of the result the answer is based on
    pub final_question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    pub question_history: Vec<String>,
    pub attempts: Vec<Attempt>,
}

impl Answer {
    /// Text shown in the chat front end.
    ///
    /// Exhausted answers are prefixed with a notice so they are never
    /// presented the same way as verified ones.
    pub fn display_text(&self) -> String {
        match self.status {
            LoopStatus::Accepted => self.answer.clone(),
            LoopStatus::Exhausted => format!(
                "Unverified answer: no query result was confirmed to match your question after {} attempt{}.\n\n{}",
                self.iterations,
                if self.iterations == 1 { "" } else { "s" },
                self.answer
            ),
        }
    }
}
