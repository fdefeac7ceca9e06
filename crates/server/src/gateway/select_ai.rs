//! Oracle Select AI over ORDS REST-enabled SQL
//!
//! Each question costs two `DBMS_CLOUD_AI.GENERATE` calls: `showsql` to get
//! the generated statement, then `runsql` to get its rows as JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use trialqa_core::sql_result::truncate_chars;
use trialqa_core::{Row, SqlFailure, SqlFailureKind, SqlResult};

use super::{GatewayError, SqlGateway};
use crate::config::DatabaseConfig;

const GENERATE_STATEMENT: &str = "SELECT DBMS_CLOUD_AI.GENERATE(prompt => :prompt, profile_name => :profile, action => :action) AS response FROM dual";
const PING_STATEMENT: &str = "SELECT 1 AS ok FROM dual";

/// Select AI's reply when it cannot produce a statement
const NOT_GENERATED_PREFIX: &str = "sorry";

/// Select AI client
#[derive(Clone)]
pub struct SelectAiGateway {
    http: reqwest::Client,
    endpoint: String,
    user: String,
    password: String,
    profile: String,
    char_limit: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SqlRequest<'a> {
    statement_text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    binds: Vec<Bind<'a>>,
}

#[derive(Serialize)]
struct Bind<'a> {
    name: &'a str,
    data_type: &'a str,
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct SqlResponse {
    #[serde(default)]
    items: Vec<StatementResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResult {
    result_set: Option<ResultSet>,
    error_code: Option<i64>,
    error_details: Option<String>,
    #[serde(default)]
    response: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(default)]
    items: Vec<Row>,
}

/// What one GENERATE call produced
#[derive(Debug, PartialEq)]
enum Generated {
    Text(String),
    Empty,
    DatabaseError(String),
}

impl SelectAiGateway {
    pub fn new(
        base_url: &str,
        config: &DatabaseConfig,
        char_limit: usize,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/ords/{}/_/sql",
                base_url.trim_end_matches('/'),
                config.schema.to_lowercase()
            ),
            user: config.user.clone(),
            password: config.password.clone(),
            profile: config.profile.clone(),
            char_limit,
        })
    }

    async fn run_statement(
        &self,
        statement: &str,
        binds: Vec<Bind<'_>>,
    ) -> Result<StatementResult, GatewayError> {
        let request = SqlRequest {
            statement_text: statement,
            binds,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http { status, message });
        }

        let body: SqlResponse = response.json().await?;
        body.items
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Protocol("no statement result in response".to_string()))
    }

    async fn generate(&self, question: &str, action: &str) -> Result<Generated, GatewayError> {
        let binds = vec![
            Bind {
                name: "prompt",
                data_type: "VARCHAR2",
                value: question,
            },
            Bind {
                name: "profile",
                data_type: "VARCHAR2",
                value: &self.profile,
            },
            Bind {
                name: "action",
                data_type: "VARCHAR2",
                value: action,
            },
        ];

        let statement = self.run_statement(GENERATE_STATEMENT, binds).await?;
        Ok(interpret(statement))
    }
}

fn interpret(statement: StatementResult) -> Generated {
    if statement.error_code.is_some() || statement.error_details.is_some() {
        let details = statement
            .error_details
            .or_else(|| statement.response.first().cloned())
            .unwrap_or_else(|| "unknown database error".to_string());
        return Generated::DatabaseError(match statement.error_code {
            Some(code) => format!("ORA-{:05}: {}", code, details),
            None => details,
        });
    }

    let text = statement
        .result_set
        .and_then(|rs| rs.items.into_iter().next())
        .and_then(|row| row.into_iter().next().map(|(_, value)| value))
        .and_then(|value| match value {
            JsonValue::String(s) => Some(s),
            JsonValue::Null => None,
            other => Some(other.to_string()),
        });

    match text {
        Some(t) if !t.trim().is_empty() => Generated::Text(t.trim().to_string()),
        _ => Generated::Empty,
    }
}

fn looks_like_sql(text: &str) -> bool {
    let head = text
        .trim_start()
        .chars()
        .take(6)
        .collect::<String>()
        .to_ascii_uppercase();
    head.starts_with("SELECT") || head.starts_with("WITH")
}

fn is_apology(text: &str) -> bool {
    text.trim_start()
        .to_ascii_lowercase()
        .starts_with(NOT_GENERATED_PREFIX)
}

/// Keep leading rows whose combined JSON stays within `limit` characters
fn rows_within(rows: Vec<Row>, limit: usize) -> Vec<Row> {
    let mut used = 2;
    let mut kept = Vec::new();
    for row in rows {
        let len = serde_json::to_string(&row).map(|s| s.len() + 1).unwrap_or(0);
        if used + len > limit && !kept.is_empty() {
            break;
        }
        used += len;
        kept.push(row);
    }
    kept
}

/// Turn the `runsql` output into a result
fn result_from_run(sql: String, generated: Generated, char_limit: usize) -> SqlResult {
    match generated {
        Generated::DatabaseError(message) => SqlResult::failed(
            Some(sql),
            SqlFailure::new(SqlFailureKind::ExecutionError, message),
        ),
        Generated::Empty => SqlResult::failed(
            Some(sql),
            SqlFailure::new(SqlFailureKind::EmptyResult, ""),
        ),
        Generated::Text(text) => {
            if is_apology(&text) {
                return SqlResult::failed(
                    Some(sql),
                    SqlFailure::new(SqlFailureKind::ExecutionError, truncate_chars(&text, char_limit)),
                );
            }
            match serde_json::from_str::<Vec<Row>>(&text) {
                Ok(rows) if rows.is_empty() => SqlResult::failed(
                    Some(sql),
                    SqlFailure::new(SqlFailureKind::EmptyResult, ""),
                ),
                Ok(rows) => {
                    let total = rows.len();
                    let kept = rows_within(rows, char_limit);
                    let truncated = kept.len() < total;
                    if truncated {
                        tracing::info!(kept = kept.len(), total, "Result rows capped");
                    }
                    SqlResult::rows(sql, kept, truncate_chars(&text, char_limit))
                        .with_truncated(truncated)
                }
                // Scalar or prose output is passed through as raw text
                Err(_) => {
                    let raw = truncate_chars(&text, char_limit);
                    let truncated = raw.len() < text.len();
                    SqlResult::rows(sql, Vec::new(), raw).with_truncated(truncated)
                }
            }
        }
    }
}

#[async_trait]
impl SqlGateway for SelectAiGateway {
    async fn execute(&self, question: &str) -> Result<SqlResult, GatewayError> {
        let sql = match self.generate(question, "showsql").await? {
            Generated::Text(text) if looks_like_sql(&text) => truncate_chars(&text, self.char_limit),
            Generated::Text(text) => {
                tracing::info!(response = %text, "Select AI did not generate SQL");
                return Ok(SqlResult::failed(
                    None,
                    SqlFailure::new(
                        SqlFailureKind::GenerationFailed,
                        truncate_chars(&text, self.char_limit),
                    ),
                ));
            }
            Generated::Empty => {
                return Ok(SqlResult::failed(
                    None,
                    SqlFailure::new(SqlFailureKind::GenerationFailed, "empty response"),
                ));
            }
            Generated::DatabaseError(message) => {
                return Ok(SqlResult::failed(
                    None,
                    SqlFailure::new(SqlFailureKind::GenerationFailed, message),
                ));
            }
        };
        tracing::debug!(sql = %sql, "Select AI generated SQL");

        let run = self.generate(question, "runsql").await?;
        let result = result_from_run(sql, run, self.char_limit);
        tracing::debug!(
            rows = result.row_count(),
            failure = ?result.failure.as_ref().map(|f| f.kind),
            "Select AI executed SQL"
        );
        Ok(result)
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        let statement = self.run_statement(PING_STATEMENT, Vec::new()).await?;
        match interpret(statement) {
            Generated::DatabaseError(message) => Err(GatewayError::Protocol(message)),
            _ => Ok(()),
        }
    }
}
