//! The hint advisor.
//!
//! Hints come either from the current order's static hint text or, when an
//! API credential is configured, from an external text-generation service
//! (the "collaborator"). [`HintAdvisor::get_hint`] always resolves to usable
//! text: every collaborator failure (transport error, bad status, timeout,
//! malformed or empty response) falls back to the static hint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::Order;
use crate::config::{HintConfig, HintProvider};
use crate::value::{Value, ValueType};

/// Used when an order carries no static hint.
pub const GENERIC_FALLBACK_HINT: &str = "Check the expected result and your arguments.";

/// Failure count from which hints become direct instead of conceptual.
const DIRECT_HINT_THRESHOLD: u32 = 2;

// ============================================================================
// Context
// ============================================================================

/// An ingredient as seen by the advisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
    /// Variable name.
    pub name: String,
    /// Bound value.
    pub value: Value,
    /// Type tag.
    pub value_type: ValueType,
}

/// Everything the advisor needs to know about the player's situation.
///
/// Captured when a hint is requested; `level` tags the request so a result
/// arriving after the player moved on can be discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintContext {
    /// Level index the request was made on.
    pub level: usize,
    /// The current order.
    pub order: Order,
    /// Name of the selected tool, if any.
    pub tool_name: Option<String>,
    /// Slot contents in order.
    pub slots: Vec<Option<SlotView>>,
    /// Most recent error message shown to the player.
    pub last_error: Option<String>,
    /// Consecutive failed runs on this level.
    pub failures: u32,
}

impl HintContext {
    /// The static hint for this context's order.
    #[must_use]
    pub fn fallback_hint(&self) -> &str {
        if self.order.hint.trim().is_empty() {
            GENERIC_FALLBACK_HINT
        } else {
            &self.order.hint
        }
    }
}

/// How explicit a generated hint should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintStrategy {
    /// Explain the idea without naming the function.
    Conceptual,
    /// Name a likely function or point at the faulty argument.
    Direct,
}

impl HintStrategy {
    /// Picks the strategy for the given number of failed attempts.
    #[must_use]
    pub const fn for_failures(failures: u32) -> Self {
        if failures < DIRECT_HINT_THRESHOLD {
            Self::Conceptual
        } else {
            Self::Direct
        }
    }

    /// Instruction embedded into the prompt.
    #[must_use]
    pub const fn directive(self) -> &'static str {
        match self {
            Self::Conceptual => {
                "Give a CONCEPTUAL hint. Explain the logic (for example, 'to find a total you add up the elements'). Do not name the specific function unless it is essential."
            }
            Self::Direct => {
                "Give a DIRECT hint. The player is stuck. Suggest a specific function or point out the mistake in the arguments."
            }
        }
    }
}

/// Renders slot contents as `name (value: v, type: t)` or `empty`.
#[must_use]
pub fn render_slots(slots: &[Option<SlotView>]) -> String {
    slots
        .iter()
        .map(|slot| match slot {
            Some(view) => format!(
                "{} (value: {}, type: {})",
                view.name, view.value, view.value_type
            ),
            None => "empty".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds the prompt sent to the collaborator.
#[must_use]
pub fn build_prompt(ctx: &HintContext) -> String {
    let strategy = HintStrategy::for_failures(ctx.failures);
    let tool = ctx.tool_name.as_deref().unwrap_or("none");
    let last_error = ctx
        .last_error
        .as_deref()
        .unwrap_or("none (the player is just asking for help)");

    format!(
        "You are a friendly chef and Python teacher in the game 'PyKitchen'.\n\
         The player is trying to solve a programming task.\n\
         \n\
         Level context:\n\
         - Task: {task}\n\
         - Expected result: {expected}\n\
         - Learning goal: {goal}\n\
         - Hint strategy: {directive}\n\
         \n\
         The player's current attempt:\n\
         - Selected function: {tool}\n\
         - Arguments: [{args}]\n\
         - Last error: {last_error}\n\
         \n\
         Instructions:\n\
         1. Be brief (2-3 sentences at most).\n\
         2. Use cooking metaphors (ingredients, recipes, tools).\n\
         3. NEVER write the finished solution code.\n\
         4. Guide the player towards using Python built-in functions correctly.\n",
        task = ctx.order.description,
        expected = ctx.order.expected_result,
        goal = ctx.order.learning_goal,
        directive = strategy.directive(),
        args = render_slots(&ctx.slots),
    )
}

// ============================================================================
// Collaborator
// ============================================================================

/// Why the collaborator could not produce a hint.
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The response did not contain any text.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// No answer within the configured timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A text-generation service.
#[async_trait]
pub trait HintCollaborator: Send + Sync + std::fmt::Debug {
    /// Generates text for `prompt` with the given model.
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, AdvisorError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<GenerateContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GenerateContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Google Generative Language API client.
#[derive(Debug, Clone)]
pub struct GeminiCollaborator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiCollaborator {
    /// Creates a client for `base_url` (e.g. `https://generativelanguage.googleapis.com/v1beta`).
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AdvisorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdvisorError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl HintCollaborator for GeminiCollaborator {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, AdvisorError> {
        let request = GenerateRequest {
            contents: vec![GenerateContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(format!("{}/models/{model}:generateContent", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AdvisorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::Malformed(e.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .find(|text| !text.trim().is_empty())
            .ok_or_else(|| AdvisorError::Malformed("no text in candidates".to_string()))
    }
}

// ============================================================================
// Advisor
// ============================================================================

/// Produces hints, online or offline.
#[derive(Debug, Clone)]
pub struct HintAdvisor {
    collaborator: Option<Arc<dyn HintCollaborator>>,
    model: String,
    timeout: Duration,
}

impl HintAdvisor {
    /// An advisor that only returns static hints.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            collaborator: None,
            model: String::new(),
            timeout: Duration::from_secs(1),
        }
    }

    /// An advisor backed by `collaborator`.
    #[must_use]
    pub fn with_collaborator(
        collaborator: Arc<dyn HintCollaborator>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            collaborator: Some(collaborator),
            model: model.into(),
            timeout,
        }
    }

    /// Builds an advisor from configuration.
    ///
    /// Reads the credential from the environment variable named by
    /// `config.api_key_env`. A missing or empty credential yields an offline
    /// advisor without surfacing an error.
    #[must_use]
    pub fn from_config(config: &HintConfig) -> Self {
        if config.provider == HintProvider::Offline {
            return Self::offline();
        }
        let api_key = std::env::var(&config.api_key_env).unwrap_or_default();
        if api_key.trim().is_empty() {
            debug!(env = %config.api_key_env, "No hint API key set, hints are offline");
            return Self::offline();
        }

        let timeout = Duration::from_secs(config.timeout_seconds);
        match GeminiCollaborator::new(api_key, &config.base_url, timeout) {
            Ok(client) => Self::with_collaborator(Arc::new(client), &config.model, timeout),
            Err(e) => {
                warn!(error = %e, "Hint collaborator unavailable, hints are offline");
                Self::offline()
            }
        }
    }

    /// Returns `true` if an external collaborator is configured.
    #[must_use]
    pub const fn is_online(&self) -> bool {
        self.collaborator.is_some()
    }

    /// Produces a hint for `ctx`. Never fails.
    pub async fn get_hint(&self, ctx: &HintContext) -> String {
        let Some(collaborator) = &self.collaborator else {
            return ctx.fallback_hint().to_string();
        };

        let prompt = build_prompt(ctx);
        let outcome = tokio::time::timeout(self.timeout, collaborator.generate(&prompt, &self.model))
            .await
            .unwrap_or(Err(AdvisorError::Timeout(self.timeout)));

        match outcome {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!(order = %ctx.order.id, "Hint collaborator returned empty text");
                ctx.fallback_hint().to_string()
            }
            Err(e) => {
                warn!(order = %ctx.order.id, error = %e, "Hint collaborator failed");
                ctx.fallback_hint().to_string()
            }
        }
    }
}
