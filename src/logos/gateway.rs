//! 🜁 Level 3: Logos - text-generation gateway
//!
//! One call contract: (system framing, profile context, question, prior memories) in,
//! answer text out. The HTTP implementation talks to an OpenAI-compatible
//! chat-completions endpoint with a bounded timeout; every transport, credential or quota
//! problem surfaces as `GenerationUnavailable`.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::demiurge::profile::CulturalProfile;
use crate::error::{AtlasError, AtlasResult};
use crate::initiation::config::GenerationSettings;
use crate::logos::prompts;
use crate::totems::record::InteractionRecord;

/// Input of one generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_framing: String,
    pub profile_context: Option<CulturalProfile>,
    pub user_question: String,
    /// Prior exchanges for grounding, most relevant first
    pub prior_memories: Vec<InteractionRecord>,
    /// Ask the service for a JSON object
    pub expect_json: bool,
}

impl GenerationRequest {
    pub fn new(system_framing: impl Into<String>, user_question: impl Into<String>) -> Self {
        Self {
            system_framing: system_framing.into(),
            profile_context: None,
            user_question: user_question.into(),
            prior_memories: Vec::new(),
            expect_json: false,
        }
    }

    pub fn with_profile(mut self, profile: CulturalProfile) -> Self {
        self.profile_context = Some(profile);
        self
    }

    pub fn with_memories(mut self, memories: Vec<InteractionRecord>) -> Self {
        self.prior_memories = memories;
        self
    }

    pub fn expecting_json(mut self) -> Self {
        self.expect_json = true;
        self
    }

    /// Framing, profile and memories joined into one system message
    pub fn system_message(&self) -> String {
        let mut sections = vec![self.system_framing.clone()];
        if let Some(profile) = &self.profile_context {
            sections.push(prompts::profile_context(profile));
        }
        if !self.expect_json {
            sections.push(prompts::memory_context(&self.prior_memories));
        }
        sections.join("\n\n")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    pub answer_text: String,
}

/// Anything that can turn a request into answer text
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> AtlasResult<GenerationResponse>;

    /// Short description for logs
    fn describe(&self) -> String;
}

// Chat-completions wire types
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// OpenAI-compatible HTTP gateway
pub struct OpenAiGateway {
    client: Client,
    settings: GenerationSettings,
    api_key: Option<String>,
}

impl OpenAiGateway {
    /// Reads the key from the configured environment variable; a missing key is only
    /// reported when the first call is made
    pub fn new(settings: GenerationSettings) -> AtlasResult<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::with_api_key(settings, api_key)
    }

    pub fn with_api_key(
        settings: GenerationSettings,
        api_key: Option<String>,
    ) -> AtlasResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AtlasError::GenerationUnavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            settings,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.api_base.trim_end_matches('/'))
    }
}

impl TextGenerator for OpenAiGateway {
    fn generate(&self, request: &GenerationRequest) -> AtlasResult<GenerationResponse> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AtlasError::GenerationUnavailable(format!(
                "no API key: set {} in the environment or .env",
                self.settings.api_key_env
            ))
        })?;

        let body = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(request.system_message()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(request.user_question.clone()),
                },
            ],
            temperature: self.settings.temperature,
            response_format: request
                .expect_json
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        tracing::debug!(
            "🤖 Generation call to {} ({} prior memories)",
            self.settings.model,
            request.prior_memories.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("request timed out after {}s", self.settings.timeout_secs)
                } else {
                    format!("service unreachable: {e}")
                };
                tracing::warn!("Generation failed: {}", reason);
                AtlasError::GenerationUnavailable(reason)
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            let reason = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    format!("credentials rejected ({status})")
                }
                StatusCode::TOO_MANY_REQUESTS => format!("quota or rate limit exceeded ({status})"),
                _ => format!("service returned {status}: {}", detail.trim()),
            };
            tracing::warn!("Generation failed: {}", reason);
            return Err(AtlasError::GenerationUnavailable(reason));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| AtlasError::GenerationUnavailable(format!("unreadable response: {e}")))?;

        let answer_text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AtlasError::GenerationUnavailable("empty completion".to_string()))?;

        Ok(GenerationResponse { answer_text })
    }

    fn describe(&self) -> String {
        format!("{} via {}", self.settings.model, self.settings.api_base)
    }
}
