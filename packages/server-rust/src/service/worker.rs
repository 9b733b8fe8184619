//! Consumption loop: one background task per subscribed consumer group.
//!
//! The loop pulls deliveries from a broker stream and hands each one to a
//! [`DeliveryHandler`], until the stream ends or [`ConsumptionLoop::stop`] is
//! called. A delivery that is already being handled when stop is requested
//! runs to completion first.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::traits::{BrokerMessage, MessageStream};

// ---------------------------------------------------------------------------
// DeliveryHandler trait
// ---------------------------------------------------------------------------

/// Processes one broker delivery. Failures are the handler's to log; the loop
/// keeps consuming regardless.
#[async_trait]
pub trait DeliveryHandler: Send + Sync + 'static {
    async fn handle(&self, group: &str, message: BrokerMessage);
}

// ---------------------------------------------------------------------------
// ConsumptionLoop
// ---------------------------------------------------------------------------

/// Handle to a running consumption task.
pub struct ConsumptionLoop {
    group: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ConsumptionLoop {
    /// Spawns the loop for `group` over `stream`.
    pub fn start(
        group: impl Into<String>,
        mut stream: MessageStream,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Self {
        let group = group.into();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let task_group = group.clone();

        let handle = tokio::spawn(async move {
            info!(group = %task_group, "consumption loop started");
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    delivery = stream.next() => match delivery {
                        Some(Ok(message)) => handler.handle(&task_group, message).await,
                        Some(Err(e)) => warn!(group = %task_group, error = %e, "broker delivery failed"),
                        None => {
                            debug!(group = %task_group, "broker stream ended");
                            break;
                        }
                    },
                }
            }
            info!(group = %task_group, "consumption loop stopped");
        });

        Self {
            group,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// True once the task has exited, whether stopped or because its stream
    /// ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signals the loop and waits for the task to exit. Calling it again is a
    /// no-op.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(group = %self.group, error = %e, "consumption loop panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
