use serde::{Deserialize, Serialize};

/// Where a question text came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOrigin {
    /// Typed by the user
    User,
    /// Reworded by the simplifier
    Simplified,
    /// Taken from the judge's suggested rewrite
    JudgeSuggestion,
    /// Produced by the refiner after a failed attempt
    Refined,
    /// Simplifier unavailable; the normalized user text is used as-is
    Fallback,
}

/// A question as submitted to the SQL gateway.
///
/// Questions are replaced, never edited: each refinement builds a new one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    /// Text sent to the gateway
    pub text: String,
    /// Text after term normalization, before any model rewording
    pub normalized: String,
    pub origin: QuestionOrigin,
    /// Iteration that produced this question (0 for the initial question)
    pub iteration: u32,
}

impl Question {
    pub fn new(
        text: impl Into<String>,
        normalized: impl Into<String>,
        origin: QuestionOrigin,
        iteration: u32,
    ) -> Self {
        Self {
            text: text.into(),
            normalized: normalized.into(),
            origin,
            iteration,
        }
    }

    /// True if `other` is the same question modulo case, whitespace and
    /// trailing punctuation.
    pub fn same_text_as(&self, other: &str) -> bool {
        comparable(&self.text) == comparable(other)
    }
}

/// Canonical form used to compare question texts
pub fn comparable(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['?', '.', '!', ' '])
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_ignores_case_spacing_and_trailing_punctuation() {
        let q = Question::new("List  subjects with CAD?", "", QuestionOrigin::User, 0);
        assert!(q.same_text_as("list subjects with cad"));
        assert!(q.same_text_as("List subjects with CAD."));
        assert!(!q.same_text_as("List subjects with MI"));
    }
}
