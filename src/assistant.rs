// src/assistant.rs
//! Bridge to the external text-generation API.
//!
//! Two surfaces use it: the one-shot coach review on the plan view and the
//! multi-turn chat. Neither ever fails outward; every problem turns into a fixed
//! sentence for the user. Each surface has a single request slot, so a second
//! call while one is in flight is rejected instead of queued.
use crate::config::AssistantConfig;
use crate::history::LogEntry;
use crate::profile::Profile;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Entries of recent history included in the coach review prompt.
const FEEDBACK_HISTORY: usize = 10;

pub const MISSING_KEY_MESSAGE: &str =
    "No API key configured. Set GEMINI_API_KEY or add assistant.api_key to config.toml.";
pub const COACH_BUSY_MESSAGE: &str = "The coach is a bit busy right now, please try again later.";
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Could not reach the coach. Please check your network connection.";
pub const CHAT_GREETING: &str = "Hi! I'm your personal AI fitness coach. Ask me anything about \
your desk-worker posture (rounded shoulders, flared ribs) or today's training plan.";

const FEEDBACK_PERSONA: &str = "You are a professional, funny fitness coach who can be a little \
sharp-tongued but genuinely cares. Do not use Markdown formatting.";
const CHAT_PERSONA: &str = "You are a professional fitness coach who specialises in fixing desk \
workers' posture problems (rounded shoulders, flared ribs). Keep answers professional, concrete \
and gentle, and format them to be easy to read.";

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("No API key configured")]
    MissingCredentials,
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to parse API response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Response contained no candidate text")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// One call to the model: a persona plus the conversation, last turn being the
/// prompt to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub persona: String,
    pub turns: Vec<ChatMessage>,
}

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, AssistantError>;
}

// ============================================================================
// Gemini wire format
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    system_instruction: GeminiContent<'a>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiResponse {
    fn first_text(self) -> Option<String> {
        self.candidates?
            .into_iter()
            .next()?
            .content?
            .parts?
            .into_iter()
            .next()?
            .text
            .filter(|t| !t.trim().is_empty())
    }
}

/// Parses a `generateContent` response body and pulls out the first candidate's text.
pub fn extract_reply(body: &str) -> Result<String, AssistantError> {
    let response: GeminiResponse = serde_json::from_str(body)?;
    response.first_text().ok_or(AssistantError::EmptyResponse)
}

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: String, config: &AssistantConfig) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// The JSON body sent for `request`.
    pub fn request_json(request: &GenerationRequest) -> serde_json::Value {
        serde_json::to_value(Self::build_body(request)).unwrap_or_default()
    }

    fn build_body(request: &GenerationRequest) -> GeminiRequest<'_> {
        let contents = request
            .turns
            .iter()
            // The API wants the conversation to open with a user turn.
            .skip_while(|m| m.role == ChatRole::Model)
            .map(|m| GeminiContent {
                role: Some(match m.role {
                    ChatRole::User => "user",
                    ChatRole::Model => "model",
                }),
                parts: vec![GeminiPart { text: &m.text }],
            })
            .collect();
        GeminiRequest {
            contents,
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: &request.persona,
                }],
            },
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, AssistantError> {
        let body = Self::build_body(request);
        debug!(model = %self.model, turns = body.contents.len(), "Sending generateContent request");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            error!(status = %status, "generateContent returned an error");
            return Err(AssistantError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        extract_reply(&text)
    }
}

// ============================================================================
// Single-slot request supervisor
// ============================================================================

/// At most one request at a time; a busy slot rejects rather than queues.
#[derive(Debug, Clone, Default)]
pub struct RequestSlot {
    busy: Arc<AtomicBool>,
}

impl RequestSlot {
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Frees the slot when dropped.
#[derive(Debug)]
pub struct SlotGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

// ============================================================================
// Gateway
// ============================================================================

pub struct Assistant {
    generator: Option<Box<dyn TextGenerator>>,
    feedback_slot: RequestSlot,
    chat_slot: RequestSlot,
}

impl Assistant {
    /// Uses the Gemini client when a key is available; without one every call
    /// answers with [`MISSING_KEY_MESSAGE`].
    pub fn from_config(config: &AssistantConfig) -> Self {
        let generator = config.resolve_api_key().and_then(|key| {
            match GeminiClient::new(key, config) {
                Ok(client) => Some(Box::new(client) as Box<dyn TextGenerator>),
                Err(e) => {
                    warn!(error = %e, "Failed to build HTTP client, assistant disabled");
                    None
                }
            }
        });
        Self::new(generator)
    }

    pub fn new(generator: Option<Box<dyn TextGenerator>>) -> Self {
        Self {
            generator,
            feedback_slot: RequestSlot::default(),
            chat_slot: RequestSlot::default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    pub fn feedback_slot(&self) -> &RequestSlot {
        &self.feedback_slot
    }

    pub fn chat_slot(&self) -> &RequestSlot {
        &self.chat_slot
    }

    /// Short coach review of recent training. `None` if a review is already in flight.
    pub async fn generate_coach_feedback(
        &self,
        logs: &[LogEntry],
        profile: &Profile,
    ) -> Option<String> {
        let _guard = self.feedback_slot.try_acquire()?;
        let request = GenerationRequest {
            persona: FEEDBACK_PERSONA.to_string(),
            turns: vec![ChatMessage::user(feedback_prompt(logs, profile))],
        };
        Some(self.dispatch(&request).await)
    }

    /// Reply to `new_message` given the transcript so far. `None` if the
    /// message is blank or a chat request is already in flight.
    pub async fn send_chat_message(
        &self,
        transcript: &[ChatMessage],
        new_message: &str,
        profile: &Profile,
    ) -> Option<String> {
        let message = new_message.trim();
        if message.is_empty() {
            return None;
        }
        let _guard = self.chat_slot.try_acquire()?;
        let mut turns = transcript.to_vec();
        turns.push(ChatMessage::user(chat_prompt(message, profile)));
        let request = GenerationRequest {
            persona: CHAT_PERSONA.to_string(),
            turns,
        };
        Some(self.dispatch(&request).await)
    }

    async fn dispatch(&self, request: &GenerationRequest) -> String {
        let Some(generator) = self.generator.as_ref() else {
            return MISSING_KEY_MESSAGE.to_string();
        };
        match generator.generate(request).await {
            Ok(text) => text,
            Err(AssistantError::MissingCredentials) => MISSING_KEY_MESSAGE.to_string(),
            Err(e @ (AssistantError::EmptyResponse | AssistantError::Status { .. })) => {
                warn!(error = %e, "Assistant gave no usable reply");
                COACH_BUSY_MESSAGE.to_string()
            }
            Err(e) => {
                warn!(error = %e, "Assistant request failed");
                CONNECTION_ERROR_MESSAGE.to_string()
            }
        }
    }
}

/// Prompt for the one-shot review: who the user is plus their last few entries.
pub fn feedback_prompt(logs: &[LogEntry], profile: &Profile) -> String {
    let start = logs.len().saturating_sub(FEEDBACK_HISTORY);
    let recent = logs[start..]
        .iter()
        .map(|l| {
            if l.has_weight() {
                format!("{}({}kg)", l.exercise_name, l.weight)
            } else {
                l.exercise_name.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let recent = if recent.is_empty() {
        "no records yet".to_string()
    } else {
        recent
    };

    format!(
        "I am a {age}-year-old {job}, {height}cm tall and {weight}kg. I have rounded shoulders, \
         a hunched upper back and flared ribs. My recent training: {recent}. Give me a roughly \
         50-word review, sharp-tongued but encouraging, and tell me what to focus on in today's \
         session.",
        age = profile.age_years,
        job = profile.occupation.to_lowercase(),
        height = profile.height_cm,
        weight = profile.weight_kg,
    )
}

pub fn chat_prompt(message: &str, profile: &Profile) -> String {
    format!(
        "User question: {message}. As a professional fitness coach, give short (under 100 words), \
         concrete advice for this {age}-year-old {job} with rounded shoulders and a hunched back.",
        age = profile.age_years,
        job = profile.occupation.to_lowercase(),
    )
}
