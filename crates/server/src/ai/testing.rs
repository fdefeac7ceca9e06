//! Deterministic stand-ins for the model and the gateway

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use trialqa_core::{PromptSet, PromptStage, PromptTemplate, Row, SqlResult};

use super::client::{LanguageModel, LlmError};
use crate::gateway::{GatewayError, SqlGateway};

/// Short templates whose first word names the stage
pub fn test_prompts() -> PromptSet {
    let t = |stage, body| PromptTemplate::parse(stage, body).unwrap();
    PromptSet {
        simplify: t(PromptStage::Simplify, "SIMPLIFY {question}"),
        judge: t(PromptStage::Judge, "JUDGE {question} || {result}"),
        refine: t(
            PromptStage::Refine,
            "REFINE {question} || {feedback} || {history} || {original_question}",
        ),
        summarize: t(
            PromptStage::Summarize,
            "SUMMARIZE {question} || {sql} || {result} || {verification}",
        ),
    }
}

fn stage_of(prompt: &str) -> Option<PromptStage> {
    match prompt.split_whitespace().next()? {
        "SIMPLIFY" => Some(PromptStage::Simplify),
        "JUDGE" => Some(PromptStage::Judge),
        "REFINE" => Some(PromptStage::Refine),
        "SUMMARIZE" => Some(PromptStage::Summarize),
        _ => None,
    }
}

/// Model that answers from per-stage queues, then per-stage defaults
#[derive(Default)]
pub struct ScriptedModel {
    queued: Mutex<HashMap<PromptStage, VecDeque<Result<String, LlmError>>>>,
    defaults: Mutex<HashMap<PromptStage, String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reply used whenever the stage queue is empty
    pub fn always(self: &Arc<Self>, stage: PromptStage, reply: &str) -> Arc<Self> {
        self.defaults
            .lock()
            .unwrap()
            .insert(stage, reply.to_string());
        Arc::clone(self)
    }

    /// Reply used once, before falling back to the default
    pub fn then(self: &Arc<Self>, stage: PromptStage, reply: Result<&str, LlmError>) -> Arc<Self> {
        self.queued
            .lock()
            .unwrap()
            .entry(stage)
            .or_default()
            .push_back(reply.map(str::to_string));
        Arc::clone(self)
    }

    pub fn prompts(&self, stage: PromptStage) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| stage_of(p) == Some(stage))
            .cloned()
            .collect()
    }

    pub fn calls(&self, stage: PromptStage) -> usize {
        self.prompts(stage).len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let stage = stage_of(prompt).ok_or_else(|| LlmError::Prompt(prompt.to_string()))?;

        if let Some(reply) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&stage)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        self.defaults
            .lock()
            .unwrap()
            .get(&stage)
            .cloned()
            .ok_or(LlmError::EmptyResponse)
    }
}

type Responder = Box<dyn Fn(&str) -> Result<SqlResult, GatewayError> + Send + Sync>;

/// Gateway that answers each question through a closure
pub struct ScriptedGateway {
    responder: Responder,
    questions: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&str) -> Result<SqlResult, GatewayError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            questions: Mutex::new(Vec::new()),
        })
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlGateway for ScriptedGateway {
    async fn execute(&self, question: &str) -> Result<SqlResult, GatewayError> {
        self.questions.lock().unwrap().push(question.to_string());
        (self.responder)(question)
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}

pub fn row(value: JsonValue) -> Row {
    value.as_object().cloned().unwrap_or_default()
}
