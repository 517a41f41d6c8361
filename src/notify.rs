//! Ordered, best-effort delivery of progress and log notifications.
//!
//! Every [`NotificationSink`] clone feeds one unbounded queue drained by a
//! single writer task, so events reach the transport in the order they were
//! produced and multi-part writes never interleave. Emitting never blocks
//! the caller; delivery failures are logged locally and otherwise ignored.
//! [`NotificationSink::flush`] waits until everything queued before it has
//! been handed to the transport.

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use rmcp::model::ProgressToken;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Severity of a log notification, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
            LogLevel::Alert => "alert",
            LogLevel::Emergency => "emergency",
        }
    }
}

impl From<rmcp::model::LoggingLevel> for LogLevel {
    fn from(level: rmcp::model::LoggingLevel) -> Self {
        use rmcp::model::LoggingLevel;
        match level {
            LoggingLevel::Debug => LogLevel::Debug,
            LoggingLevel::Info => LogLevel::Info,
            LoggingLevel::Notice => LogLevel::Notice,
            LoggingLevel::Warning => LogLevel::Warning,
            LoggingLevel::Error => LogLevel::Error,
            LoggingLevel::Critical => LogLevel::Critical,
            LoggingLevel::Alert => LogLevel::Alert,
            LoggingLevel::Emergency => LogLevel::Emergency,
        }
    }
}

/// A one-way event destined for the peer.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    /// `total` of `None` means the amount of work is unknown.
    Progress {
        token: ProgressToken,
        current: u64,
        total: Option<u64>,
    },
    Log {
        level: LogLevel,
        message: String,
        source: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("peer connection closed")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
}

/// The outbound half of the peer connection.
pub trait NotificationTransport: Send + Sync + 'static {
    fn deliver(&self, event: NotificationEvent) -> BoxFuture<'_, Result<(), DeliveryError>>;
}

/// Entry in the writer queue.
enum Queued {
    Event(NotificationEvent),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
enum Outbox {
    Writer(mpsc::UnboundedSender<Queued>),
    Capture(mpsc::UnboundedSender<NotificationEvent>),
}

/// Cloneable handle for emitting notifications.
#[derive(Clone)]
pub struct NotificationSink {
    outbox: Outbox,
    min_level: Arc<RwLock<LogLevel>>,
}

impl NotificationSink {
    /// Start the writer task for `transport`. Must be called inside a tokio
    /// runtime.
    pub fn spawn<T: NotificationTransport>(transport: T) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(rx, transport));
        Self::with_outbox(Outbox::Writer(tx))
    }

    /// A sink whose events are handed straight to the returned receiver.
    /// Tests use it to observe emission order.
    pub fn capture() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_outbox(Outbox::Capture(tx)), rx)
    }

    fn with_outbox(outbox: Outbox) -> Self {
        Self {
            outbox,
            min_level: Arc::new(RwLock::new(LogLevel::Info)),
        }
    }

    /// Log notifications below `level` are dropped at emission.
    pub fn set_min_level(&self, level: LogLevel) {
        *self.min_level.write() = level;
    }

    pub fn min_level(&self) -> LogLevel {
        *self.min_level.read()
    }

    pub fn progress(&self, token: &ProgressToken, current: u64, total: Option<u64>) {
        let total = total.filter(|t| *t > 0);
        self.emit(NotificationEvent::Progress {
            token: token.clone(),
            current,
            total,
        });
    }

    pub fn log(&self, level: LogLevel, source: Option<&str>, message: impl Into<String>) {
        if level < self.min_level() {
            return;
        }
        self.emit(NotificationEvent::Log {
            level,
            message: message.into(),
            source: source.map(str::to_string),
        });
    }

    /// Wait until every event emitted so far has been delivered or has
    /// failed delivery. Returns at once for a capturing sink or when the
    /// writer is gone.
    pub async fn flush(&self) {
        let Outbox::Writer(tx) = &self.outbox else {
            return;
        };
        let (done, flushed) = oneshot::channel();
        if tx.send(Queued::Flush(done)).is_err() {
            return;
        }
        if flushed.await.is_err() {
            tracing::debug!("notification writer exited before flushing");
        }
    }

    fn emit(&self, event: NotificationEvent) {
        let sent = match &self.outbox {
            Outbox::Writer(tx) => tx.send(Queued::Event(event)).is_ok(),
            Outbox::Capture(tx) => tx.send(event).is_ok(),
        };
        if !sent {
            tracing::debug!("notification writer has exited; dropping event");
        }
    }
}

async fn run_writer<T: NotificationTransport>(
    mut rx: mpsc::UnboundedReceiver<Queued>,
    transport: T,
) {
    let mut failing = false;
    while let Some(queued) = rx.recv().await {
        let event = match queued {
            Queued::Event(event) => event,
            Queued::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };
        match transport.deliver(event).await {
            Ok(()) => failing = false,
            Err(e) if failing => tracing::debug!(error = %e, "notification delivery failed"),
            Err(e) => {
                // Warn once per run of failures; a disconnected peer would
                // otherwise flood the log.
                tracing::warn!(error = %e, "notification delivery failed");
                failing = true;
            }
        }
    }
    tracing::debug!("notification writer exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::NumberOrString;
    use tokio::sync::Mutex;

    fn token() -> ProgressToken {
        ProgressToken(NumberOrString::String("tok".into()))
    }

    #[tokio::test]
    async fn capture_preserves_emission_order() {
        let (sink, mut rx) = NotificationSink::capture();
        sink.progress(&token(), 1, Some(3));
        sink.log(LogLevel::Info, Some("count_words"), "halfway");
        sink.progress(&token(), 3, Some(3));
        drop(sink);

        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], NotificationEvent::Progress { current: 1, .. }));
        assert!(matches!(events[1], NotificationEvent::Log { .. }));
        assert!(matches!(events[2], NotificationEvent::Progress { current: 3, .. }));
    }

    #[tokio::test]
    async fn zero_total_is_indeterminate() {
        let (sink, mut rx) = NotificationSink::capture();
        sink.progress(&token(), 5, Some(0));
        assert_eq!(
            rx.recv().await.unwrap(),
            NotificationEvent::Progress {
                token: token(),
                current: 5,
                total: None
            }
        );
    }

    #[tokio::test]
    async fn logs_below_min_level_are_dropped() {
        let (sink, mut rx) = NotificationSink::capture();
        sink.log(LogLevel::Debug, None, "chatty");
        sink.set_min_level(LogLevel::Warning);
        sink.log(LogLevel::Info, None, "still chatty");
        sink.log(LogLevel::Error, None, "important");
        drop(sink);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, NotificationEvent::Log { level: LogLevel::Error, .. }));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Alert < LogLevel::Emergency);
    }

    /// Records delivered events and fails the first `fail_first` deliveries.
    struct Recording {
        delivered: Arc<Mutex<Vec<NotificationEvent>>>,
        fail_first: Mutex<usize>,
    }

    impl NotificationTransport for Recording {
        fn deliver(&self, event: NotificationEvent) -> BoxFuture<'_, Result<(), DeliveryError>> {
            Box::pin(async move {
                let mut remaining = self.fail_first.lock().await;
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(DeliveryError::Closed);
                }
                self.delivered.lock().await.push(event);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn writer_survives_delivery_failures_in_order() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = NotificationSink::spawn(Recording {
            delivered: delivered.clone(),
            fail_first: Mutex::new(1),
        });
        for i in 1..=4 {
            sink.progress(&token(), i, Some(4));
        }

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while delivered.lock().await.len() < 3 {
            assert!(std::time::Instant::now() < deadline, "writer stalled");
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let currents: Vec<u64> = delivered
            .lock()
            .await
            .iter()
            .map(|e| match e {
                NotificationEvent::Progress { current, .. } => *current,
                NotificationEvent::Log { .. } => 0,
            })
            .collect();
        assert_eq!(currents, vec![2, 3, 4]);
    }

    /// Delivers after a delay, so anything not awaited is still in flight.
    struct Slow {
        delivered: Arc<Mutex<Vec<NotificationEvent>>>,
    }

    impl NotificationTransport for Slow {
        fn deliver(&self, event: NotificationEvent) -> BoxFuture<'_, Result<(), DeliveryError>> {
            Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                self.delivered.lock().await.push(event);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn flush_waits_for_queued_events() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = NotificationSink::spawn(Slow {
            delivered: delivered.clone(),
        });
        sink.progress(&token(), 1, Some(2));
        sink.log(LogLevel::Warning, Some("search_files"), "slow disk");
        sink.progress(&token(), 2, Some(2));
        sink.flush().await;

        let delivered = delivered.lock().await;
        assert_eq!(delivered.len(), 3);
        assert!(matches!(
            delivered[2],
            NotificationEvent::Progress { current: 2, total: Some(2), .. }
        ));
    }

    #[tokio::test]
    async fn flush_on_capture_sink_returns_immediately() {
        let (sink, mut rx) = NotificationSink::capture();
        sink.progress(&token(), 1, Some(1));
        sink.flush().await;
        assert!(rx.try_recv().is_ok());
    }
}
