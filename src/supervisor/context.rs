use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rmcp::model::ProgressToken;
use tokio_util::sync::CancellationToken;

use super::progress::ProgressReporter;
use super::Phase;
use crate::delegate::{DelegatedComputeClient, DelegatedOutcome, DelegatedRequest};
use crate::error::ToolError;
use crate::notify::{LogLevel, NotificationSink};
use crate::roots::{Access, PathAuthorizer, PermissionSet};

/// Everything a tool handler may touch while it runs.
///
/// Handed to the handler by value; clones share the same invocation state.
/// The notification sink, delegation client and authorizer are passed in
/// explicitly by the supervisor.
#[derive(Clone)]
pub struct ToolContext {
    inner: Arc<Inner>,
}

struct Inner {
    operation: String,
    target: Option<PathBuf>,
    progress_token: Option<ProgressToken>,
    cancel: CancellationToken,
    sink: NotificationSink,
    delegate: DelegatedComputeClient,
    authorizer: PathAuthorizer,
    phase: Arc<Mutex<Phase>>,
    /// Last reported `(current, total)`.
    last_progress: Mutex<Option<(u64, u64)>>,
}

pub(crate) struct ContextParts {
    pub operation: String,
    pub target: Option<PathBuf>,
    pub progress_token: Option<ProgressToken>,
    pub cancel: CancellationToken,
    pub sink: NotificationSink,
    pub delegate: DelegatedComputeClient,
    pub authorizer: PathAuthorizer,
    pub phase: Arc<Mutex<Phase>>,
}

impl ToolContext {
    pub(crate) fn new(parts: ContextParts) -> Self {
        Self {
            inner: Arc::new(Inner {
                operation: parts.operation,
                target: parts.target,
                progress_token: parts.progress_token,
                cancel: parts.cancel,
                sink: parts.sink,
                delegate: parts.delegate,
                authorizer: parts.authorizer,
                phase: parts.phase,
                last_progress: Mutex::new(None),
            }),
        }
    }

    pub fn operation(&self) -> &str {
        &self.inner.operation
    }

    pub fn phase(&self) -> Phase {
        *self.inner.phase.lock()
    }

    /// The resolved path that passed authorization.
    pub fn target_path(&self) -> Result<&Path, ToolError> {
        self.inner.target.as_deref().ok_or_else(|| {
            ToolError::Internal(format!("{} has no authorized path", self.inner.operation))
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Cooperative cancellation point. Call before each unit of work.
    pub fn checkpoint(&self) -> Result<(), ToolError> {
        if self.is_cancelled() {
            Err(ToolError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Authorize a path discovered during execution. Denied paths are
    /// skipped by the caller, not treated as a failure.
    pub async fn authorize(&self, path: &Path) -> Option<PathBuf> {
        match self.inner.authorizer.check_async(path).await {
            Access::Allow(resolved) => Some(resolved),
            Access::Deny(denial) => {
                tracing::debug!(path = %path.display(), %denial, "skipping unauthorized path");
                None
            }
        }
    }

    pub fn permissions(&self) -> &PermissionSet {
        self.inner.authorizer.permissions()
    }

    /// Send a log notification to the peer, tagged with the tool name.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.inner
            .sink
            .log(level, Some(&self.inner.operation), message);
    }

    /// Start a progress stream over `total` units.
    pub fn progress(&self, total: u64) -> ProgressReporter {
        ProgressReporter::new(self.clone(), total)
    }

    pub(crate) fn emit_progress(&self, current: u64, total: u64) {
        let mut last = self.inner.last_progress.lock();
        if let Some((previous, _)) = *last {
            if current < previous {
                tracing::debug!(current, previous, "dropping regressive progress report");
                return;
            }
        }
        *last = Some((current, total));
        if let Some(token) = &self.inner.progress_token {
            self.inner.sink.progress(token, current, Some(total));
        }
    }

    /// Close an unfinished progress stream with a final `total/total` report.
    pub(crate) fn settle_progress(&self) {
        let pending = match *self.inner.last_progress.lock() {
            Some((current, total)) if current < total => Some(total),
            _ => None,
        };
        if let Some(total) = pending {
            self.emit_progress(total, total);
        }
    }

    pub fn delegation_deadline(&self) -> Duration {
        self.inner.delegate.default_deadline()
    }

    /// Run a delegated request with the configured deadline.
    ///
    /// The invocation waits for the outcome. Cancellation is checked before
    /// the request is issued and again once it resolves.
    pub async fn delegate(&self, request: &DelegatedRequest) -> Result<DelegatedOutcome, ToolError> {
        self.checkpoint()?;
        self.set_phase(Phase::Delegating);
        let outcome = self
            .inner
            .delegate
            .request(request, self.delegation_deadline())
            .await;
        self.set_phase(Phase::Executing);
        self.checkpoint()?;
        Ok(outcome)
    }

    fn set_phase(&self, phase: Phase) {
        let mut current = self.inner.phase.lock();
        tracing::trace!(from = ?*current, to = ?phase, "phase transition");
        *current = phase;
    }
}
