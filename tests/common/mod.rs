#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docscout::config::SamplingConfig;
use docscout::delegate::{DelegatedComputeClient, DelegatedRequest, PeerError, SamplingPeer};
use docscout::notify::{NotificationEvent, NotificationSink};
use docscout::roots::{PathAuthorizer, PermissionSet};
use docscout::supervisor::Supervisor;
use docscout::tools::builtin_registry;
use futures::future::BoxFuture;
use rmcp::model::JsonObject;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

/// What a [`ScriptedPeer`] does when asked for a completion.
#[derive(Clone)]
pub enum Script {
    Reply(&'static str),
    Hang,
    Fail(PeerError),
}

/// A sampling peer with a fixed answer that counts how often it was asked.
pub struct ScriptedPeer {
    supports: bool,
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedPeer {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            supports: true,
            script,
            calls: AtomicUsize::new(0),
        })
    }

    /// A peer that never advertised sampling.
    pub fn unsupported() -> Arc<Self> {
        Arc::new(Self {
            supports: false,
            script: Script::Hang,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SamplingPeer for ScriptedPeer {
    fn supports_sampling(&self) -> bool {
        self.supports
    }

    fn create_message<'a>(
        &'a self,
        _request: &'a DelegatedRequest,
    ) -> BoxFuture<'a, Result<String, PeerError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            match &self.script {
                Script::Reply(text) => Ok(text.to_string()),
                Script::Hang => std::future::pending().await,
                Script::Fail(e) => Err(e.clone()),
            }
        })
    }
}

/// A supervisor over the built-in tools with a captured notification stream.
pub struct Harness {
    pub supervisor: Supervisor,
    pub events: UnboundedReceiver<NotificationEvent>,
}

impl Harness {
    pub fn new(permissions: PermissionSet, peer: Option<Arc<ScriptedPeer>>, deadline: Duration) -> Self {
        let registry = builtin_registry(&SamplingConfig::default()).unwrap();
        let (sink, events) = NotificationSink::capture();
        let delegate = match peer {
            Some(peer) => DelegatedComputeClient::new(peer, deadline),
            None => DelegatedComputeClient::disabled(),
        };
        let supervisor = Supervisor::new(
            Arc::new(registry),
            PathAuthorizer::new(permissions),
            sink,
            delegate,
        );
        Self { supervisor, events }
    }

    /// A harness rooted at `root` with no sampling peer.
    pub fn rooted(root: &Path) -> Self {
        Self::new(
            PermissionSet::new([root]).unwrap(),
            None,
            Duration::from_secs(1),
        )
    }

    /// Everything emitted so far.
    pub fn drain(&mut self) -> Vec<NotificationEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

/// `(current, total)` of every progress event, in order.
pub fn progress_of(events: &[NotificationEvent]) -> Vec<(u64, Option<u64>)> {
    events
        .iter()
        .filter_map(|e| match e {
            NotificationEvent::Progress { current, total, .. } => Some((*current, *total)),
            NotificationEvent::Log { .. } => None,
        })
        .collect()
}

pub fn args(v: Value) -> JsonObject {
    match v {
        Value::Object(m) => m,
        _ => panic!("expected object"),
    }
}

/// Write a file of `n` numbered lines and return its path.
pub fn write_lines(dir: &Path, name: &str, n: usize) -> PathBuf {
    let path = dir.join(name);
    let body: String = (1..=n).map(|i| format!("line {i} of the report\n")).collect();
    std::fs::write(&path, body).unwrap();
    path
}
