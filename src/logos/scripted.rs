//! Scripted generator for offline runs and tests

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::error::{AtlasError, AtlasResult};
use crate::logos::gateway::{GenerationRequest, GenerationResponse, TextGenerator};

/// Replays queued replies in order; unavailable once the queue is empty
#[derive(Default)]
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<AtlasResult<String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway whose every call fails as unavailable
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(text.into()));
        self
    }

    pub fn fail(self, error: AtlasError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    /// Number of calls received so far
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().last().cloned()
    }
}

impl TextGenerator for ScriptedGateway {
    fn generate(&self, request: &GenerationRequest) -> AtlasResult<GenerationResponse> {
        self.requests.lock().push(request.clone());
        match self.replies.lock().pop_front() {
            Some(Ok(answer_text)) => Ok(GenerationResponse { answer_text }),
            Some(Err(e)) => Err(e),
            None => Err(AtlasError::GenerationUnavailable(
                "scripted gateway has no replies left".to_string(),
            )),
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
