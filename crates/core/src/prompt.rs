//! Versioned prompt templates, one per pipeline stage

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Pipeline stage a prompt belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PromptStage {
    Simplify,
    Judge,
    Refine,
    Summarize,
}

impl PromptStage {
    pub const ALL: [PromptStage; 4] = [
        PromptStage::Simplify,
        PromptStage::Judge,
        PromptStage::Refine,
        PromptStage::Summarize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptStage::Simplify => "simplify",
            PromptStage::Judge => "judge",
            PromptStage::Refine => "refine",
            PromptStage::Summarize => "summarize",
        }
    }

    /// Placeholders a template for this stage may use
    pub fn variables(&self) -> &'static [&'static str] {
        match self {
            PromptStage::Simplify => &["question", "dictionary"],
            PromptStage::Judge => &["question", "result"],
            PromptStage::Refine => &[
                "question",
                "original_question",
                "feedback",
                "history",
                "dictionary",
            ],
            PromptStage::Summarize => &["question", "sql", "result", "verification"],
        }
    }

    fn builtin_source(&self) -> &'static str {
        match self {
            PromptStage::Simplify => include_str!("../prompts/simplify.txt"),
            PromptStage::Judge => include_str!("../prompts/judge.txt"),
            PromptStage::Refine => include_str!("../prompts/refine.txt"),
            PromptStage::Summarize => include_str!("../prompts/summarize.txt"),
        }
    }
}

impl fmt::Display for PromptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prompt body with `{name}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub stage: PromptStage,
    pub version: String,
    body: String,
}

impl PromptTemplate {
    /// Parse template source. An optional first line `version: <v>` sets the
    /// version; every `{name}` placeholder must be a variable of the stage.
    pub fn parse(stage: PromptStage, source: &str) -> Result<Self, CoreError> {
        let (version, body) = match source.split_once('\n') {
            Some((first, rest)) if first.trim_start().starts_with("version:") => (
                first.trim_start()["version:".len()..].trim().to_string(),
                rest,
            ),
            _ => ("unversioned".to_string(), source),
        };

        let body = body.trim().to_string();
        if body.is_empty() {
            return Err(CoreError::InvalidTemplate {
                stage: stage.to_string(),
                reason: "template body is empty".to_string(),
            });
        }

        for name in placeholders(&body) {
            if !stage.variables().contains(&name) {
                return Err(CoreError::InvalidTemplate {
                    stage: stage.to_string(),
                    reason: format!("unknown placeholder '{{{}}}'", name),
                });
            }
        }

        Ok(Self {
            stage,
            version,
            body,
        })
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Substitute placeholders in a single pass; substituted values are
    /// never scanned for further placeholders.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<String, CoreError> {
        let mut out = String::with_capacity(self.body.len());
        let mut rest = self.body.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_placeholder_name(&after[..close]) => {
                    let name = &after[..close];
                    let value = vars
                        .iter()
                        .find(|(k, _)| *k == name)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| CoreError::MissingVariable {
                            stage: self.stage.to_string(),
                            variable: name.to_string(),
                        })?;
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);

        Ok(out)
    }
}

fn is_placeholder_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

fn placeholders(body: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = body;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_placeholder_name(&after[..close]) => {
                names.push(&after[..close]);
                rest = &after[close + 1..];
            }
            _ => rest = after,
        }
    }
    names
}

/// Templates for every stage
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub simplify: PromptTemplate,
    pub judge: PromptTemplate,
    pub refine: PromptTemplate,
    pub summarize: PromptTemplate,
}

impl PromptSet {
    /// Templates shipped with the crate
    pub fn builtin() -> Result<Self, CoreError> {
        Self::from_sources(|stage| Ok(Some(stage.builtin_source().to_string())))
    }

    /// Load `<stage>.txt` files from `dir`, falling back to the built-in
    /// template for any stage without a file.
    pub fn load_dir(dir: &Path) -> Result<Self, CoreError> {
        Self::from_sources(|stage| {
            let path = dir.join(format!("{}.txt", stage.as_str()));
            if !path.exists() {
                return Ok(None);
            }
            std::fs::read_to_string(&path)
                .map(Some)
                .map_err(|e| CoreError::InvalidTemplate {
                    stage: stage.to_string(),
                    reason: format!("cannot read {}: {}", path.display(), e),
                })
        })
    }

    fn from_sources<F>(mut source: F) -> Result<Self, CoreError>
    where
        F: FnMut(PromptStage) -> Result<Option<String>, CoreError>,
    {
        let mut load = |stage: PromptStage| -> Result<PromptTemplate, CoreError> {
            let text = source(stage)?.unwrap_or_else(|| stage.builtin_source().to_string());
            PromptTemplate::parse(stage, &text)
        };
        Ok(Self {
            simplify: load(PromptStage::Simplify)?,
            judge: load(PromptStage::Judge)?,
            refine: load(PromptStage::Refine)?,
            summarize: load(PromptStage::Summarize)?,
        })
    }

    pub fn get(&self, stage: PromptStage) -> &PromptTemplate {
        match stage {
            PromptStage::Simplify => &self.simplify,
            PromptStage::Judge => &self.judge,
            PromptStage::Refine => &self.refine,
            PromptStage::Summarize => &self.summarize,
        }
    }
}
