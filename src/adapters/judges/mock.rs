//! Scripted judge client for tests and offline runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::errors::{HealError, HealResult};
use crate::domain::ports::JudgeClient;

/// Returns canned responses per model. Models scripted with a sequence pop
/// one response per call; an exhausted or unscripted model yields a
/// provider error (which the judge turns into an ERROR vote).
#[derive(Default)]
pub struct ScriptedJudgeClient {
    responses: Mutex<HashMap<String, Vec<String>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedJudgeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a model to repeat one response forever.
    pub fn script(&self, model: &str, response: &str) {
        // A single entry is treated as inexhaustible.
        self.responses
            .lock()
            .expect("responses lock")
            .insert(model.to_string(), vec![response.to_string()]);
    }

    /// Script a model with one response per call, in order.
    pub fn script_sequence(&self, model: &str, responses: Vec<&str>) {
        self.responses.lock().expect("responses lock").insert(
            model.to_string(),
            responses.into_iter().rev().map(ToString::to_string).collect(),
        );
    }

    /// Models called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl JudgeClient for ScriptedJudgeClient {
    async fn complete(&self, model: &str, _prompt: &str) -> HealResult<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(model.to_string());
        let mut responses = self.responses.lock().expect("responses lock");
        match responses.get_mut(model) {
            Some(queue) if queue.len() == 1 => Ok(queue[0].clone()),
            Some(queue) => queue.pop().ok_or_else(|| {
                HealError::provider("scripted-judge", format!("responses exhausted for {model}"))
            }),
            None => Err(HealError::provider(
                "scripted-judge",
                format!("no scripted response for {model}"),
            )),
        }
    }
}
