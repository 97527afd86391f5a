//! HTTP-based decision capability.
//!
//! [`HttpDecision`] posts each [`DecisionRequest`] as JSON to a configured
//! endpoint and expects a [`Decision`] back:
//!
//! ```text
//! POST {endpoint}
//!   { "agent": {...}, "event": {...}, "properties": {...},
//!     "world": {...}, "available_actions": [...] }
//! <- { "reasoning": "...", "proposed_actions": [ {"action_id": ..., ...} ] }
//! ```
//!
//! Without an endpoint, [`DecisionBackend`] falls back to
//! [`AcknowledgeDecision`], so the engine runs with no external service.

use std::time::Duration;

use npc_core::{
    AcknowledgeDecision, Decision, DecisionCapability, DecisionConfig, DecisionError,
    DecisionRequest,
};
use tracing::debug;

use crate::error::AppError;

/// The configured decision capability.
///
/// Uses enum dispatch instead of trait objects because async methods
/// are not dyn-compatible in Rust.
#[derive(Debug)]
pub enum DecisionBackend {
    /// External decision service.
    Http(HttpDecision),
    /// Local stub that proposes nothing.
    Acknowledge(AcknowledgeDecision),
}

impl DecisionBackend {
    /// Build the backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &DecisionConfig) -> Result<Self, AppError> {
        match &config.endpoint {
            Some(endpoint) => Ok(Self::Http(HttpDecision::new(
                endpoint,
                config.api_key.clone(),
                Duration::from_millis(config.request_timeout_ms),
            )?)),
            None => Ok(Self::Acknowledge(AcknowledgeDecision::new())),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Http(_) => "http",
            Self::Acknowledge(_) => "acknowledge",
        }
    }
}

impl DecisionCapability for DecisionBackend {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, DecisionError> {
        match self {
            Self::Http(backend) => backend.decide(request).await,
            Self::Acknowledge(backend) => backend.decide(request).await,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP backend
// ---------------------------------------------------------------------------

/// Decision capability backed by an HTTP service.
#[derive(Debug)]
pub struct HttpDecision {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpDecision {
    /// Create a client for `endpoint` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Http`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_owned(),
            api_key,
        })
    }
}

impl DecisionCapability for HttpDecision {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, DecisionError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| DecisionError::Internal {
            message: format!("decision request failed: {e}"),
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(DecisionError::Internal {
                message: format!("decision service returned {status}: {error_body}"),
            });
        }

        let decision: Decision = response.json().await.map_err(|e| DecisionError::Internal {
            message: format!("decision response parse failed: {e}"),
        })?;

        debug!(
            agent_id = %request.agent.id,
            proposed = decision.proposed_actions.len(),
            "decision received"
        );
        Ok(decision)
    }
}
