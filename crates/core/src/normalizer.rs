//! Clinical term normalization against a static dictionary

use std::collections::HashMap;

use regex::{Captures, Regex, RegexBuilder};

use crate::error::CoreError;

/// Dictionary shipped with the crate
pub const DEFAULT_DICTIONARY: &str = include_str!("../data/medical_terms.txt");

/// One dictionary entry: a phrase and the standard term that replaces it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermEntry {
    pub phrase: String,
    pub replacement: String,
}

/// Replaces known clinical phrases with their standard abbreviations.
///
/// Matching is case-insensitive and whole-word, tolerates any run of
/// whitespace between the words of a phrase, and prefers the longest
/// phrase when several start at the same position.
#[derive(Debug, Clone)]
pub struct TermNormalizer {
    entries: Vec<TermEntry>,
    by_key: HashMap<String, String>,
    pattern: Option<Regex>,
}

impl TermNormalizer {
    /// Build a normalizer from dictionary entries.
    ///
    /// Rejects empty phrases and duplicate phrases. Also rejects any
    /// replacement that shares words with a dictionary phrase in a way the
    /// phrase could match after replacement: inside it, or across its start
    /// or end together with the surrounding text. This keeps
    /// normalization idempotent.
    pub fn new(entries: Vec<TermEntry>) -> Result<Self, CoreError> {
        let mut by_key = HashMap::new();
        for entry in &entries {
            let key = phrase_key(&entry.phrase);
            if key.is_empty() {
                return Err(CoreError::InvalidDictionary("empty phrase".to_string()));
            }
            if entry.replacement.trim().is_empty() {
                return Err(CoreError::InvalidDictionary(format!(
                    "empty replacement for '{}'",
                    entry.phrase
                )));
            }
            if by_key.insert(key, entry.replacement.trim().to_string()).is_some() {
                return Err(CoreError::InvalidDictionary(format!(
                    "duplicate phrase '{}'",
                    entry.phrase
                )));
            }
        }

        for entry in &entries {
            let replacement = words(&entry.replacement);
            if let Some(other) = entries
                .iter()
                .find(|other| overlaps(&replacement, &words(&other.phrase)))
            {
                return Err(CoreError::InvalidDictionary(format!(
                    "replacement '{}' for '{}' can combine with neighbouring words into the phrase '{}'",
                    entry.replacement, entry.phrase, other.phrase
                )));
            }
        }

        let pattern = build_pattern(&entries)?;
        let normalizer = Self {
            entries,
            by_key,
            pattern,
        };

        if let Some(pattern) = &normalizer.pattern {
            for entry in &normalizer.entries {
                if let Some(found) = pattern.find(&entry.replacement) {
                    return Err(CoreError::InvalidDictionary(format!(
                        "replacement '{}' for '{}' contains the phrase '{}'",
                        entry.replacement,
                        entry.phrase,
                        found.as_str()
                    )));
                }
            }
        }

        Ok(normalizer)
    }

    /// Parse `Phrase = Replacement` lines; blank lines and `#` comments are skipped
    pub fn parse_dictionary(text: &str) -> Result<Vec<TermEntry>, CoreError> {
        text.lines()
            .enumerate()
            .map(|(n, line)| (n + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .map(|(n, line)| {
                let (phrase, replacement) = line.split_once('=').ok_or_else(|| {
                    CoreError::InvalidDictionary(format!("line {}: expected 'phrase = term'", n))
                })?;
                Ok(TermEntry {
                    phrase: phrase.trim().to_string(),
                    replacement: replacement.trim().to_string(),
                })
            })
            .collect()
    }

    /// Build a normalizer from dictionary text
    pub fn from_dictionary(text: &str) -> Result<Self, CoreError> {
        Self::new(Self::parse_dictionary(text)?)
    }

    /// Normalizer over the built-in clinical dictionary
    pub fn builtin() -> Result<Self, CoreError> {
        Self::from_dictionary(DEFAULT_DICTIONARY)
    }

    /// Replace every dictionary phrase in `text` with its standard term
    pub fn normalize(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };
        pattern
            .replace_all(text, |caps: &Captures| {
                let matched = &caps[0];
                self.by_key
                    .get(&phrase_key(matched))
                    .cloned()
                    .unwrap_or_else(|| matched.to_string())
            })
            .into_owned()
    }

    pub fn entries(&self) -> &[TermEntry] {
        &self.entries
    }

    /// Dictionary rendered for inclusion in prompts
    pub fn dictionary_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{} = {}", e.phrase, e.replacement))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn phrase_key(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// True if `replacement` and `phrase` agree on every word where they
/// overlap, for some placement of one against the other.
fn overlaps(replacement: &[String], phrase: &[String]) -> bool {
    if replacement.is_empty() || phrase.is_empty() {
        return false;
    }
    let start = 1 - replacement.len() as isize;
    (start..phrase.len() as isize).any(|offset| {
        replacement.iter().enumerate().all(|(i, word)| {
            let j = offset + i as isize;
            j < 0 || j >= phrase.len() as isize || phrase[j as usize] == *word
        })
    })
}

fn build_pattern(entries: &[TermEntry]) -> Result<Option<Regex>, CoreError> {
    if entries.is_empty() {
        return Ok(None);
    }

    let mut phrases: Vec<&str> = entries.iter().map(|e| e.phrase.as_str()).collect();
    // Alternation is leftmost-first, so longer phrases must come first
    phrases.sort_by(|a, b| phrase_key(b).len().cmp(&phrase_key(a).len()));

    let alternatives = phrases
        .iter()
        .map(|p| {
            p.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join("|");

    RegexBuilder::new(&format!(r"\b(?:{})\b", alternatives))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| CoreError::InvalidDictionary(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> TermNormalizer {
        TermNormalizer::builtin().unwrap()
    }

    #[test]
    fn builtin_dictionary_loads() {
        let n = builtin();
        assert_eq!(n.entries().len(), 15);
        assert!(n.dictionary_text().contains("Type 2 Diabetes Mellitus = DM2"));
    }

    #[test]
    fn replaces_case_insensitively() {
        let n = builtin();
        assert_eq!(
            n.normalize("subjects with type 2 diabetes mellitus and a myocardial infarction"),
            "subjects with DM2 and a MI"
        );
    }

    #[test]
    fn tolerates_extra_whitespace_inside_phrases() {
        let n = builtin();
        assert_eq!(n.normalize("Coronary   Artery\tDisease"), "CAD");
    }

    #[test]
    fn prefers_longest_phrase() {
        let n = TermNormalizer::new(vec![
            TermEntry {
                phrase: "artery disease".into(),
                replacement: "AD".into(),
            },
            TermEntry {
                phrase: "coronary artery disease".into(),
                replacement: "CAD".into(),
            },
        ])
        .unwrap();
        assert_eq!(n.normalize("history of coronary artery disease"), "history of CAD");
        assert_eq!(n.normalize("peripheral artery disease"), "peripheral AD");
    }

    #[test]
    fn matches_whole_words_only() {
        let n = builtin();
        assert_eq!(n.normalize("outpatient visits"), "outpatient visits");
        assert_eq!(n.normalize("the patient"), "the Subject");
    }

    #[test]
    fn unmatched_text_passes_through() {
        let n = builtin();
        let text = "subjects with DM2 who discontinued treatment";
        assert_eq!(n.normalize(text), text);
    }

    #[test]
    fn normalization_is_idempotent() {
        let n = builtin();
        let samples = [
            "Identify all subjects with a documented history of coronary artery disease that came in for an initial point of reference check",
            "Count patients taking concomitant medication at the initial visit",
            "Average systolic blood pressure and diastolic blood pressure by electrocardiogram result",
            "PATIENT with Type 1 Diabetes Mellitus or abdominal aortic aneurysm",
            "",
            "nothing to see here",
        ];
        for sample in samples {
            let once = n.normalize(sample);
            assert_eq!(n.normalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn rejects_non_idempotent_dictionary() {
        let err = TermNormalizer::from_dictionary("heart attack = MI\nMI = myocardial infarction")
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidDictionary(_)));
    }

    #[test]
    fn rejects_phrases_formed_across_a_replacement() {
        // "prior heart attack history" -> "prior MI history" -> "prior MIH"
        assert!(TermNormalizer::from_dictionary("heart attack = MI\nMI history = MIH").is_err());
        // suffix side: "acute heart attack" -> "acute MI" -> "AMI"
        assert!(TermNormalizer::from_dictionary("heart attack = MI\nacute MI = AMI").is_err());
        // replacement in the middle of a longer phrase
        assert!(TermNormalizer::from_dictionary("heart attack = MI\nprior MI event = PMI").is_err());
        // adjacent replacements forming a phrase
        assert!(TermNormalizer::from_dictionary("first = A\nsecond = B\nA B = AB").is_err());
    }

    #[test]
    fn unrelated_multi_word_replacements_are_accepted() {
        let n = TermNormalizer::from_dictionary(
            "Initial visit = baseline visit\nheart attack = MI\nmedical history = MH",
        )
        .unwrap();
        let once = n.normalize("initial visit heart attack medical history");
        assert_eq!(once, "baseline visit MI MH");
        assert_eq!(n.normalize(&once), once);
    }

    #[test]
    fn rejects_duplicates_and_malformed_lines() {
        assert!(TermNormalizer::from_dictionary("a = b\nA = c").is_err());
        assert!(TermNormalizer::from_dictionary("no separator here").is_err());
        assert!(TermNormalizer::from_dictionary(" = x").is_err());
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let n = TermNormalizer::from_dictionary("# header\n\nheart attack = MI\n").unwrap();
        assert_eq!(n.normalize("prior heart attack"), "prior MI");
    }

    #[test]
    fn empty_dictionary_is_identity() {
        let n = TermNormalizer::new(Vec::new()).unwrap();
        assert_eq!(n.normalize("Patient"), "Patient");
    }
}
