//! trialqa-core: Shared types for the clinical trial question-answering service
//!
//! This crate holds the request-scoped value types (questions, SQL results,
//! verdicts, answers), the clinical term normalizer, and the prompt
//! templates used by each pipeline stage. It performs no I/O beyond
//! reading prompt files on request.

pub mod error;
pub mod normalizer;
pub mod outcome;
pub mod prompt;
pub mod question;
pub mod sql_result;
pub mod verdict;

pub use error::CoreError;
pub use normalizer::{TermEntry, TermNormalizer};
pub use outcome::{Answer, Attempt, ExhaustionReason, LoopStatus};
pub use prompt::{PromptSet, PromptStage, PromptTemplate};
pub use question::{Question, QuestionOrigin};
pub use sql_result::{Row, SqlFailure, SqlFailureKind, SqlResult};
pub use verdict::Verdict;
