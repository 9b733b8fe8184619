//! Publish/subscribe facade.
//!
//! `publish` sends an application event to the broker registered under the
//! event's name. `subscribe` starts one consumption loop per consumer group,
//! relaying every delivery to the application through the shared
//! [`Relayer`].

use std::collections::HashMap;
use std::sync::Arc;

use sidecar_core::{Event, RequestContext, SidecarError, TRACEPARENT};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::registry::ComponentRegistry;
use super::relay::Relayer;
use super::worker::ConsumptionLoop;
use crate::telemetry::{ActiveSpan, Tracer};
use crate::traits::BrokerMessage;

pub struct PublishFacade {
    registry: Arc<ComponentRegistry>,
    tracer: Arc<dyn Tracer>,
    relayer: Arc<Relayer>,
    subscriptions: Mutex<HashMap<String, ConsumptionLoop>>,
}

impl PublishFacade {
    #[must_use]
    pub fn new(
        registry: Arc<ComponentRegistry>,
        tracer: Arc<dyn Tracer>,
        relayer: Arc<Relayer>,
    ) -> Self {
        Self {
            registry,
            tracer,
            relayer,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Publishes `event` to the broker registered under its name. An unset
    /// `created_at` is stamped with the current time.
    ///
    /// # Errors
    ///
    /// `BadRequest` for an empty event name (no broker is touched),
    /// `ComponentNotFound` when no broker has that name, `Internal` when
    /// encoding or the broker fails.
    pub async fn publish(&self, ctx: &RequestContext, mut event: Event) -> Result<(), SidecarError> {
        if event.event_name.is_empty() {
            return Err(SidecarError::bad_request("event name is required"));
        }
        let broker = self.registry.broker(&event.event_name)?;
        event.stamp();

        let mut span = ActiveSpan::start(
            Arc::clone(&self.tracer),
            "broker.publish",
            Some(&ctx.trace),
        );
        span.add_metadata("eventName", &event.event_name);

        let result = async {
            let body = event
                .to_broker_bytes()
                .map_err(|e| SidecarError::internal(format!("failed to encode event: {e}")))?;
            let mut message = BrokerMessage::new(event.event_name.clone(), body);
            message
                .headers
                .insert(TRACEPARENT.to_string(), span.context().to_traceparent());
            broker.publish(message).await.map_err(|e| {
                SidecarError::internal(format!(
                    "failed to publish event {}: {e:#}",
                    event.event_name
                ))
            })
        }
        .await;

        span.record_result(&result);
        result
    }

    /// Starts the consumption loop for `group`. Already running groups are
    /// left alone.
    ///
    /// # Errors
    ///
    /// `ComponentNotFound` when no broker is registered for the group,
    /// `Internal` when the broker refuses the subscription.
    pub async fn subscribe(&self, group: &str) -> Result<(), SidecarError> {
        let mut subscriptions = self.subscriptions.lock().await;
        if subscriptions.get(group).is_some_and(|l| !l.is_finished()) {
            return Ok(());
        }

        let broker = self.registry.broker(group)?;
        let stream = broker.subscribe(group).await.map_err(|e| {
            SidecarError::internal(format!("failed to subscribe group {group}: {e:#}"))
        })?;

        let relayer: Arc<Relayer> = Arc::clone(&self.relayer);
        subscriptions.insert(group.to_string(), ConsumptionLoop::start(group, stream, relayer));
        info!(group = %group, "subscribed");
        Ok(())
    }

    /// Stops the loop for `group`, waiting for any in-flight relay, then
    /// releases the broker subscription. Unknown groups are a no-op.
    ///
    /// # Errors
    ///
    /// `Internal` when the broker fails to unsubscribe. The loop is stopped
    /// regardless.
    pub async fn unsubscribe(&self, group: &str) -> Result<(), SidecarError> {
        let Some(mut consumption) = self.subscriptions.lock().await.remove(group) else {
            return Ok(());
        };
        consumption.stop().await;

        let broker = self.registry.broker(group)?;
        broker.unsubscribe(group).await.map_err(|e| {
            SidecarError::internal(format!("failed to unsubscribe group {group}: {e:#}"))
        })?;
        info!(group = %group, "unsubscribed");
        Ok(())
    }

    /// Unsubscribes every group, logging failures.
    pub async fn unsubscribe_all(&self) {
        for group in self.subscriptions().await {
            if let Err(e) = self.unsubscribe(&group).await {
                warn!(group = %group, error = %e, "failed to unsubscribe");
            }
        }
    }

    /// Groups with a registered consumption loop, sorted.
    pub async fn subscriptions(&self) -> Vec<String> {
        let mut groups: Vec<String> = self.subscriptions.lock().await.keys().cloned().collect();
        groups.sort();
        groups
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
