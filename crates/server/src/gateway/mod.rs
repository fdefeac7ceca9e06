//! SQL execution gateway: hands a question to an NL2SQL service that both
//! generates and runs the SQL

mod select_ai;

pub use select_ai::SelectAiGateway;

use async_trait::async_trait;
use thiserror::Error;
use trialqa_core::SqlResult;

/// Failures reaching the NL2SQL service.
///
/// These say nothing about the question itself. Problems with the question
/// (no SQL generated, SQL rejected, no rows) come back as
/// [`SqlResult::failure`] instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("SQL service request timed out")]
    Timeout,

    #[error("SQL service request failed: {0}")]
    Transport(String),

    #[error("SQL service returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Unexpected SQL service response: {0}")]
    Protocol(String),
}

impl GatewayError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::Protocol(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Natural-language-to-SQL execution.
///
/// One call generates SQL for `question` and executes it. Implementations
/// never retry; the refinement loop decides what happens next.
#[async_trait]
pub trait SqlGateway: Send + Sync {
    async fn execute(&self, question: &str) -> Result<SqlResult, GatewayError>;

    /// Check that the service is reachable
    async fn ping(&self) -> Result<(), GatewayError>;
}
