//! Supervised execution of a single tool invocation.
//!
//! [`Supervisor::invoke`] walks one request through
//! `Created → Authorizing → Executing → (Delegating) → Completed | Failed |
//! Cancelled` and always yields exactly one [`Outcome`]:
//!
//! - Authorizing is skipped for tools without a filesystem dependency. A
//!   denied path fails the invocation before the handler runs, with a single
//!   warning-level log notification.
//! - The handler reports progress and logs through its [`ToolContext`].
//! - Cancellation is cooperative: it is observed before authorization, at
//!   the handler's checkpoints, and around delegated calls.
//! - Failures are logged once, where they are detected.
//! - A progress stream left unfinished by the handler is settled at
//!   `total/total` whatever the terminal phase, and every notification the
//!   invocation produced is delivered before its outcome is returned.

mod context;
mod progress;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rmcp::model::{JsonObject, ProgressToken};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

pub use context::ToolContext;
pub use progress::{ProgressMeter, ProgressReporter};

use crate::delegate::DelegatedComputeClient;
use crate::error::{ErrorKind, ToolError};
use crate::notify::{LogLevel, NotificationSink};
use crate::registry::ToolRegistry;
use crate::roots::{Access, PathAuthorizer};
use context::ContextParts;

/// Lifecycle of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Authorizing,
    Executing,
    Delegating,
    Completed,
    Failed,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed | Phase::Cancelled)
    }
}

/// An incoming request to run a tool.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub operation: String,
    pub arguments: JsonObject,
    pub progress_token: Option<ProgressToken>,
    pub cancel: CancellationToken,
}

impl InvocationRequest {
    pub fn new(operation: impl Into<String>, arguments: JsonObject) -> Self {
        Self {
            operation: operation.into(),
            arguments,
            progress_token: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress_token(mut self, token: ProgressToken) -> Self {
        self.progress_token = Some(token);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// The single terminal result of an invocation.
#[derive(Debug)]
pub struct Outcome {
    pub invocation: Uuid,
    pub phase: Phase,
    pub result: Result<Value, ToolError>,
}

impl Outcome {
    pub fn into_result(self) -> Result<Value, ToolError> {
        self.result
    }
}

/// Owns one in-flight invocation from arrival until its outcome.
struct Invocation {
    id: Uuid,
    operation: String,
    progress_token: Option<ProgressToken>,
    cancel: CancellationToken,
    phase: Arc<Mutex<Phase>>,
}

impl Invocation {
    fn new(request: &InvocationRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation: request.operation.clone(),
            progress_token: request.progress_token.clone(),
            cancel: request.cancel.clone(),
            phase: Arc::new(Mutex::new(Phase::Created)),
        }
    }

    fn transition(&self, to: Phase) {
        let mut phase = self.phase.lock();
        tracing::trace!(from = ?*phase, to = ?to, "phase transition");
        *phase = to;
    }
}

/// Drives tool invocations against a registry, an authorizer and the
/// peer-facing collaborators.
#[derive(Clone)]
pub struct Supervisor {
    registry: Arc<ToolRegistry>,
    authorizer: PathAuthorizer,
    sink: NotificationSink,
    delegate: DelegatedComputeClient,
}

impl Supervisor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        authorizer: PathAuthorizer,
        sink: NotificationSink,
        delegate: DelegatedComputeClient,
    ) -> Self {
        Self {
            registry,
            authorizer,
            sink,
            delegate,
        }
    }

    pub fn sink(&self) -> &NotificationSink {
        &self.sink
    }

    pub async fn invoke(&self, request: InvocationRequest) -> Outcome {
        let invocation = Invocation::new(&request);
        let span = tracing::info_span!(
            "invocation",
            id = %invocation.id,
            tool = %invocation.operation,
        );

        async {
            let started = std::time::Instant::now();
            let result = self.drive(&invocation, request.arguments).await;
            self.sink.flush().await;
            let phase = match &result {
                Ok(_) => Phase::Completed,
                Err(ToolError::Cancelled) => Phase::Cancelled,
                Err(_) => Phase::Failed,
            };
            invocation.transition(phase);
            tracing::debug!(
                phase = ?phase,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "invocation finished"
            );
            Outcome {
                invocation: invocation.id,
                phase,
                result,
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(&self, invocation: &Invocation, arguments: JsonObject) -> Result<Value, ToolError> {
        if invocation.cancel.is_cancelled() {
            tracing::info!("cancelled before start");
            return Err(ToolError::Cancelled);
        }

        let tool = self.registry.get(&invocation.operation).ok_or_else(|| {
            self.fail(
                invocation,
                ToolError::InvalidArgument(format!("unknown tool: {}", invocation.operation)),
            )
        })?;
        let prepared = tool
            .prepare(arguments)
            .map_err(|e| self.fail(invocation, e))?;

        let target = match prepared.target_path() {
            None => None,
            Some(raw) => {
                invocation.transition(Phase::Authorizing);
                Some(self.authorize(invocation, raw).await?)
            }
        };

        invocation.transition(Phase::Executing);
        let cx = ToolContext::new(ContextParts {
            operation: invocation.operation.clone(),
            target,
            progress_token: invocation.progress_token.clone(),
            cancel: invocation.cancel.clone(),
            sink: self.sink.clone(),
            delegate: self.delegate.clone(),
            authorizer: self.authorizer.clone(),
            phase: invocation.phase.clone(),
        });

        let result = prepared.run(cx.clone()).await;
        cx.settle_progress();
        match result {
            Ok(value) => Ok(value),
            Err(ToolError::Cancelled) => {
                tracing::info!("cancelled at checkpoint");
                Err(ToolError::Cancelled)
            }
            Err(e) => Err(self.fail(invocation, e)),
        }
    }

    async fn authorize(
        &self,
        invocation: &Invocation,
        raw: &str,
    ) -> Result<std::path::PathBuf, ToolError> {
        match self.authorizer.check_async(Path::new(raw)).await {
            Access::Allow(resolved) => {
                tracing::debug!(path = %resolved.display(), "access granted");
                Ok(resolved)
            }
            Access::Deny(denial) => {
                let err = ToolError::AccessDenied {
                    path: raw.to_string(),
                    reason: denial.to_string(),
                };
                tracing::warn!(path = raw, %denial, "access denied");
                self.sink
                    .log(LogLevel::Warning, Some(&invocation.operation), err.to_string());
                Err(err)
            }
        }
    }

    /// Log a terminal failure once and hand it back.
    fn fail(&self, invocation: &Invocation, err: ToolError) -> ToolError {
        match err.kind() {
            ErrorKind::Internal => tracing::error!(kind = %err.kind(), error = %err, "invocation failed"),
            _ => tracing::warn!(kind = %err.kind(), error = %err, "invocation failed"),
        }
        self.sink
            .log(LogLevel::Error, Some(&invocation.operation), err.to_string());
        err
    }
}
