//! Judge verdicts and their parsing from free-text model output

use serde::{Deserialize, Serialize};

const AFFIRMATIVE: &[&str] = &["pass", "passed", "yes"];
const NEGATIVE: &[&str] = &["fail", "failed", "no"];
const REVISION_LABELS: &[&str] = &["revised question", "suggested question", "improved question"];

/// Whether a SQL result satisfies the intent of the user's question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verdict {
    pub satisfied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// False when the model output carried no recognizable verdict
    pub parsed: bool,
}

impl Verdict {
    pub fn pass() -> Self {
        Self {
            satisfied: true,
            revised_question: None,
            rationale: None,
            parsed: true,
        }
    }

    pub fn fail(rationale: impl Into<String>) -> Self {
        Self {
            satisfied: false,
            revised_question: None,
            rationale: Some(rationale.into()),
            parsed: true,
        }
    }

    /// Negative verdict used when no judgement could be obtained
    pub fn fail_closed(rationale: impl Into<String>) -> Self {
        Self {
            parsed: false,
            ..Self::fail(rationale)
        }
    }

    pub fn with_revised_question(mut self, question: impl Into<String>) -> Self {
        self.revised_question = Some(question.into());
        self
    }

    /// Parse a judge response.
    ///
    /// The first word of the response decides: `Pass`/`Yes` is satisfied,
    /// `Fail`/`No` is not. Anything else fails closed. Text after the first
    /// `:` on the verdict line is the rationale, and a `Revised question:`
    /// line anywhere in the response is taken as the suggested rewrite.
    pub fn parse(response: &str) -> Self {
        let mut lines = response.lines().map(str::trim).filter(|l| !l.is_empty());

        let Some(first) = lines.next() else {
            return Self::fail_closed("Empty judge response");
        };
        let first = strip_noise(first);

        let word: String = first
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_lowercase();

        let revised = response.lines().find_map(revision_from_line);

        if AFFIRMATIVE.contains(&word.as_str()) {
            return Self::pass();
        }

        if NEGATIVE.contains(&word.as_str()) {
            let rest = first[word.len()..].trim_start_matches(|c: char| {
                c == ':' || c == '-' || c == ',' || c == '*' || c.is_whitespace()
            });
            let rationale = if rest.is_empty() {
                lines
                    .map(strip_noise)
                    .find(|l| revision_from_line(l).is_none())
                    .unwrap_or("Result does not answer the question")
                    .to_string()
            } else {
                rest.to_string()
            };
            let verdict = Self::fail(rationale);
            return match revised {
                Some(q) => verdict.with_revised_question(q),
                None => verdict,
            };
        }

        let verdict = Self::fail_closed(format!("Unrecognized judge response: {}", first));
        match revised {
            Some(q) => verdict.with_revised_question(q),
            None => verdict,
        }
    }

    /// Feedback text handed to the refiner
    pub fn feedback(&self) -> String {
        self.rationale
            .clone()
            .unwrap_or_else(|| "Result does not answer the question".to_string())
    }
}

/// Strip markdown emphasis, quotes and backticks wrapping a line
fn strip_noise(line: &str) -> &str {
    line.trim()
        .trim_start_matches(['*', '`', '"', '\'', '#', '>', '_', ' '])
        .trim_end_matches(['*', '`', '"', '\'', '_', ' '])
}

fn revision_from_line(line: &str) -> Option<String> {
    let line = strip_noise(line);
    let (label, value) = line.split_once(':')?;
    let label = label.trim_matches(['*', '_', ' ']).to_ascii_lowercase();
    if !REVISION_LABELS.contains(&label.as_str()) {
        return None;
    }
    let value = strip_noise(value);
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_is_satisfied() {
        let v = Verdict::parse("Pass");
        assert!(v.satisfied);
        assert!(v.parsed);
        assert!(Verdict::parse("**Pass** (the rows list CAD subjects)").satisfied);
        assert!(Verdict::parse("`Pass`").satisfied);
        assert!(Verdict::parse("yes, this answers it").satisfied);
    }

    #[test]
    fn fail_carries_reason() {
        let v = Verdict::parse("Fail: Result incomplete. Counts are missing.");
        assert!(!v.satisfied);
        assert!(v.parsed);
        assert_eq!(v.rationale.as_deref(), Some("Result incomplete. Counts are missing."));
    }

    #[test]
    fn fail_with_reason_on_next_line() {
        let v = Verdict::parse("Fail\nIrrelevant data in the result.");
        assert!(!v.satisfied);
        assert_eq!(v.rationale.as_deref(), Some("Irrelevant data in the result."));
    }

    #[test]
    fn revised_question_is_extracted() {
        let v = Verdict::parse(
            "Fail: no counts\nRevised question: Count AEs of Migraine grouped by severity",
        );
        assert!(!v.satisfied);
        assert_eq!(
            v.revised_question.as_deref(),
            Some("Count AEs of Migraine grouped by severity")
        );
    }

    #[test]
    fn affirmative_word_must_lead() {
        // "Passing" and "Not pass" are not recognized verdicts
        assert!(!Verdict::parse("Passing grade").satisfied);
        let v = Verdict::parse("Not pass, the data is wrong");
        assert!(!v.satisfied);
        assert!(!v.parsed);
    }

    #[test]
    fn unparseable_output_fails_closed() {
        for text in ["", "   ", "I think it might be okay", "{\"ok\": true}", "Looks good. Pass"] {
            let v = Verdict::parse(text);
            assert!(!v.satisfied, "{text:?} must not be accepted");
            assert!(!v.parsed);
        }
    }
}
