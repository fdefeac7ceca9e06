//! Result of one NL2SQL execution

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A single result row; column names are whatever the generated SQL produced
pub type Row = serde_json::Map<String, JsonValue>;

/// Placeholder rendered to prompts when there is no result data
pub const NO_RESULT: &str = "NONE";

/// Why an execution did not yield usable data
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SqlFailureKind {
    /// The service could not turn the question into SQL
    GenerationFailed,
    /// The SQL was generated but the database rejected it
    ExecutionError,
    /// The SQL ran and returned no rows
    EmptyResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SqlFailure {
    pub kind: SqlFailureKind,
    pub message: String,
}

impl SqlFailure {
    pub fn new(kind: SqlFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Feedback text handed to the refiner
    pub fn describe(&self) -> String {
        match self.kind {
            SqlFailureKind::GenerationFailed => format!(
                "No SQL query could be generated for this question: {}",
                self.message
            ),
            SqlFailureKind::ExecutionError => {
                format!("The generated SQL query failed to run: {}", self.message)
            }
            SqlFailureKind::EmptyResult => format!(
                "The generated SQL query returned no rows. {}",
                self.message
            )
            .trim_end()
            .to_string(),
        }
    }
}

/// Generated SQL plus its executed result (or the reason there is none)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SqlResult {
    pub sql: Option<String>,
    #[serde(default)]
    pub rows: Vec<Row>,
    /// Result text as returned by the service
    #[serde(default)]
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<SqlFailure>,
    /// Rows or text were dropped to stay within the size cap
    #[serde(default)]
    pub truncated: bool,
}

impl SqlResult {
    /// A successful execution
    pub fn rows(sql: impl Into<String>, rows: Vec<Row>, raw: impl Into<String>) -> Self {
        Self {
            sql: Some(sql.into()),
            rows,
            raw: raw.into(),
            failure: None,
            truncated: false,
        }
    }

    /// A failed execution, with whatever SQL was generated before it failed
    pub fn failed(sql: Option<String>, failure: SqlFailure) -> Self {
        Self {
            sql,
            rows: Vec::new(),
            raw: String::new(),
            failure: Some(failure),
            truncated: false,
        }
    }

    /// Mark the result as cut down to fit the size cap
    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// SQL text for prompts, `NONE` if nothing was generated
    pub fn sql_for_prompt(&self) -> &str {
        self.sql.as_deref().unwrap_or(NO_RESULT)
    }

    /// Render the result data for a prompt.
    ///
    /// Rows are rendered as a JSON array. Results that came back as
    /// non-tabular text fall back to the raw text; failures and empty
    /// results render as `NONE`. A truncated result carries a note saying
    /// so after the data.
    pub fn render_for_prompt(&self) -> String {
        if !self.rows.is_empty() {
            let rendered =
                serde_json::to_string(&self.rows).unwrap_or_else(|_| self.raw.clone());
            if !self.truncated {
                return rendered;
            }
            return format!(
                "{rendered}\n(Only the first {} rows are shown; the full result was longer.)",
                self.rows.len()
            );
        }
        if self.is_success() && !self.raw.trim().is_empty() {
            if !self.truncated {
                return self.raw.clone();
            }
            return format!("{}\n(The result text was cut short.)", self.raw);
        }
        NO_RESULT.to_string()
    }
}

/// Truncate `text` to at most `limit` characters on a char boundary
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: JsonValue) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn renders_rows_as_json_array() {
        let result = SqlResult::rows(
            "SELECT 1",
            vec![row(json!({"subject_id": 101, "ae_term": "Hyperglycemia"}))],
            "",
        );
        let rendered: JsonValue = serde_json::from_str(&result.render_for_prompt()).unwrap();
        assert_eq!(rendered, json!([{"subject_id": 101, "ae_term": "Hyperglycemia"}]));
    }

    #[test]
    fn failures_render_as_none() {
        let result = SqlResult::failed(
            Some("SELECT x FROM y".into()),
            SqlFailure::new(SqlFailureKind::ExecutionError, "ORA-00942"),
        );
        assert!(!result.is_success());
        assert_eq!(result.render_for_prompt(), NO_RESULT);
        assert_eq!(result.sql_for_prompt(), "SELECT x FROM y");
    }

    #[test]
    fn truncated_results_say_so() {
        let rows = vec![row(json!({"subject_id": 101})), row(json!({"subject_id": 102}))];
        let full = SqlResult::rows("SELECT subject_id FROM dm", rows.clone(), "");
        assert!(!full.render_for_prompt().contains("full result was longer"));

        let cut = SqlResult::rows("SELECT subject_id FROM dm", rows, "").with_truncated(true);
        let rendered = cut.render_for_prompt();
        let (data, note) = rendered.split_once('\n').unwrap();
        let data: JsonValue = serde_json::from_str(data).unwrap();
        assert_eq!(data, json!([{"subject_id": 101}, {"subject_id": 102}]));
        assert!(note.contains("first 2 rows"));

        let text = SqlResult::rows("SELECT note FROM dm", Vec::new(), "long text").with_truncated(true);
        assert!(text.render_for_prompt().starts_with("long text\n"));
        assert!(text.render_for_prompt().contains("cut short"));
    }

    #[test]
    fn non_tabular_text_is_kept() {
        let result = SqlResult::rows("SELECT COUNT(*) FROM dm", Vec::new(), "42");
        assert_eq!(result.render_for_prompt(), "42");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
