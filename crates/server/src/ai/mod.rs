//! Language model stages and the refinement loop that drives them

pub mod client;
pub mod judge;
pub mod refinement;
pub mod refiner;
pub mod simplifier;
pub mod summarizer;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ClaudeClient, LanguageModel, LlmError};
pub use judge::{LlmJudge, ResultJudge};
pub use refinement::{Assistant, AssistantError, LoopState};

/// Labels models like to put in front of a reworded question
const QUESTION_LABELS: &[&str] = &[
    "reworded question",
    "reworded",
    "simplified question",
    "new question",
    "improved question",
    "revised question",
    "question",
];

/// Pull a single question out of a model reply.
///
/// Takes the first line with content, drops a leading label such as
/// `Reworded Question:` or `Here is the reworded question:`, and strips
/// wrapping quotes, backticks and markdown emphasis. Lines that only
/// introduce what follows (ending in a colon) are skipped. Returns `None`
/// when nothing is left.
pub fn clean_question(reply: &str) -> Option<String> {
    reply.lines().find_map(|line| {
        let mut line = strip_wrapping(line);
        if line.ends_with(':') {
            return None;
        }
        if let Some((label, rest)) = line.split_once(':') {
            if is_question_label(strip_wrapping(label)) {
                line = strip_wrapping(rest);
            }
        }
        (!line.is_empty()).then(|| line.to_string())
    })
}

fn is_question_label(label: &str) -> bool {
    let label = label.to_ascii_lowercase();
    QUESTION_LABELS.iter().any(|known| {
        label == *known
            || label
                .strip_suffix(known)
                .is_some_and(|lead| lead.ends_with(' '))
    })
}

fn strip_wrapping(text: &str) -> &str {
    text.trim().trim_matches(['"', '\'', '`', '*', '“', '”', ' '])
}
