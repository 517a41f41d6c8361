//! Delegated computation: asking the peer to run a language-model completion
//! on our behalf.
//!
//! Every call resolves to exactly one [`DelegatedOutcome`]. Callers are
//! expected to match on it exhaustively and substitute a local fallback for
//! anything other than `Fulfilled`; delegation is an optimization, never a
//! hard dependency.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::error::ErrorKind;

/// An immutable request for a delegated completion.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegatedRequest {
    prompt: String,
    system_prompt: Option<String>,
    max_tokens: u32,
    temperature: Option<f32>,
    model_hint: Option<String>,
}

impl DelegatedRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens: max_tokens.max(1),
            temperature: None,
            model_hint: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    pub fn with_model_hint(mut self, hint: impl Into<String>) -> Self {
        self.model_hint = Some(hint.into());
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub fn model_hint(&self) -> Option<&str> {
        self.model_hint.as_deref()
    }
}

/// Why the peer cannot perform delegated computation at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineReason {
    /// The peer did not declare the capability during initialization.
    NotAdvertised,
    /// The peer answered that it does not implement the method.
    MethodNotFound,
}

impl std::fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclineReason::NotAdvertised => f.write_str("client does not support sampling"),
            DeclineReason::MethodNotFound => f.write_str("client does not implement sampling"),
        }
    }
}

/// The peer supports delegation but this call did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelegationError {
    #[error("no response within {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("client rejected the request: {0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Closed three-way result of a delegated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegatedOutcome {
    Fulfilled(String),
    Declined(DeclineReason),
    Failed(DelegationError),
}

impl DelegatedOutcome {
    /// Error classification of a non-fulfilled outcome.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            DelegatedOutcome::Fulfilled(_) => None,
            DelegatedOutcome::Declined(_) => Some(ErrorKind::DelegationDeclined),
            DelegatedOutcome::Failed(DelegationError::Timeout(_)) => {
                Some(ErrorKind::DelegationTimeout)
            }
            DelegatedOutcome::Failed(_) => Some(ErrorKind::DelegationFailed),
        }
    }
}

/// Raw failure reported by a [`SamplingPeer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    #[error("method not found")]
    MethodNotFound,
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    UnexpectedResponse(String),
}

/// The peer side of delegated computation.
pub trait SamplingPeer: Send + Sync + 'static {
    /// Whether the peer declared the capability when the session started.
    fn supports_sampling(&self) -> bool;

    /// Issue the request and return the completion text.
    fn create_message<'a>(
        &'a self,
        request: &'a DelegatedRequest,
    ) -> BoxFuture<'a, Result<String, PeerError>>;
}

/// Issues delegated requests and normalizes their outcomes.
#[derive(Clone)]
pub struct DelegatedComputeClient {
    peer: Option<Arc<dyn SamplingPeer>>,
    default_deadline: Duration,
}

impl DelegatedComputeClient {
    pub fn new(peer: Arc<dyn SamplingPeer>, default_deadline: Duration) -> Self {
        Self {
            peer: Some(peer),
            default_deadline,
        }
    }

    /// A client with no peer; every request is declined.
    pub fn disabled() -> Self {
        Self {
            peer: None,
            default_deadline: Duration::ZERO,
        }
    }

    pub fn default_deadline(&self) -> Duration {
        self.default_deadline
    }

    /// Run `request` against the peer, giving up after `deadline`.
    pub async fn request(&self, request: &DelegatedRequest, deadline: Duration) -> DelegatedOutcome {
        let Some(peer) = self.peer.as_ref() else {
            return DelegatedOutcome::Declined(DeclineReason::NotAdvertised);
        };
        if !peer.supports_sampling() {
            tracing::debug!("peer did not advertise sampling; declining delegation");
            return DelegatedOutcome::Declined(DeclineReason::NotAdvertised);
        }

        let started = std::time::Instant::now();
        let outcome = match tokio::time::timeout(deadline, peer.create_message(request)).await {
            Err(_) => DelegatedOutcome::Failed(DelegationError::Timeout(deadline)),
            Ok(Ok(text)) if text.trim().is_empty() => DelegatedOutcome::Failed(
                DelegationError::UnexpectedResponse("empty completion".to_string()),
            ),
            Ok(Ok(text)) => DelegatedOutcome::Fulfilled(text),
            Ok(Err(PeerError::MethodNotFound)) => {
                DelegatedOutcome::Declined(DeclineReason::MethodNotFound)
            }
            Ok(Err(PeerError::Rejected(msg))) => {
                DelegatedOutcome::Failed(DelegationError::Rejected(msg))
            }
            Ok(Err(PeerError::Transport(msg))) => {
                DelegatedOutcome::Failed(DelegationError::Transport(msg))
            }
            Ok(Err(PeerError::UnexpectedResponse(msg))) => {
                DelegatedOutcome::Failed(DelegationError::UnexpectedResponse(msg))
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            DelegatedOutcome::Fulfilled(text) => {
                tracing::info!(elapsed_ms, chars = text.len(), "delegated request fulfilled")
            }
            DelegatedOutcome::Declined(reason) => {
                tracing::info!(elapsed_ms, %reason, "delegated request declined")
            }
            DelegatedOutcome::Failed(error) => {
                tracing::warn!(elapsed_ms, %error, "delegated request failed")
            }
        }
        outcome
    }
}
