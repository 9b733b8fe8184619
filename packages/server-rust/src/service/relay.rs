//! Relay of broker deliveries to the local application.
//!
//! [`RouteTable`] maps an event name to a target; [`Relayer`] decodes each
//! delivery, resolves its target, and calls the application within a fixed
//! timeout, recording a `relay.<group>` span per delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use sidecar_core::{Event, SidecarError, TraceContext, TRACEPARENT};
use tracing::{debug, warn};

use super::worker::DeliveryHandler;
use crate::client::{AppClient, RelayError};
use crate::config::ServiceProtocol;
use crate::telemetry::{ActiveSpan, Tracer};
use crate::traits::BrokerMessage;

// ---------------------------------------------------------------------------
// RouteTable
// ---------------------------------------------------------------------------

/// Resolves where an inbound event is delivered in the local application.
///
/// An explicit entry always wins. Otherwise HTTP derives `/<name>` with `.`
/// separators turned into path segments. RPC/gRPC split a dashed name into
/// capitalized `Service.Method` segments (`go-a` becomes `Go.A`), and
/// otherwise derive `<RelayService>.<Name>` when a relay service is
/// configured.
#[derive(Debug, Clone)]
pub struct RouteTable {
    protocol: ServiceProtocol,
    explicit: HashMap<String, String>,
    relay_service: Option<String>,
}

impl RouteTable {
    #[must_use]
    pub fn new(protocol: ServiceProtocol, relay_service: Option<String>) -> Self {
        Self {
            protocol,
            explicit: HashMap::new(),
            relay_service: relay_service.filter(|s| !s.is_empty()),
        }
    }

    /// Parses `name=target` pairs separated by commas.
    ///
    /// # Errors
    ///
    /// Returns an error for a pair without `=` or with an empty side.
    pub fn with_routes(mut self, raw: &str) -> anyhow::Result<Self> {
        for pair in crate::config::split_list(raw) {
            let Some((name, target)) = pair.split_once('=') else {
                bail!("route {pair:?} is not name=target");
            };
            let (name, target) = (name.trim(), target.trim());
            if name.is_empty() || target.is_empty() {
                bail!("route {pair:?} has an empty side");
            }
            self.explicit.insert(name.to_string(), target.to_string());
        }
        Ok(self)
    }

    pub fn insert(&mut self, event_name: impl Into<String>, target: impl Into<String>) {
        self.explicit.insert(event_name.into(), target.into());
    }

    /// # Errors
    ///
    /// Returns [`RelayError::RouteNotFound`] when no target can be derived.
    pub fn resolve(&self, event_name: &str) -> Result<String, RelayError> {
        if let Some(target) = self.explicit.get(event_name) {
            return Ok(target.clone());
        }
        if event_name.is_empty() {
            return Err(RelayError::RouteNotFound {
                event_name: String::new(),
            });
        }
        match self.protocol {
            ServiceProtocol::Http => Ok(format!("/{}", event_name.replace('.', "/"))),
            ServiceProtocol::Rpc | ServiceProtocol::Grpc if event_name.contains('-') => {
                dashed_method(event_name).ok_or_else(|| RelayError::RouteNotFound {
                    event_name: event_name.to_string(),
                })
            }
            ServiceProtocol::Rpc | ServiceProtocol::Grpc => match &self.relay_service {
                Some(service) => Ok(format!("{service}.{}", capitalize(event_name))),
                None => Err(RelayError::RouteNotFound {
                    event_name: event_name.to_string(),
                }),
            },
        }
    }
}

/// `go-a` to `Go.A`. `None` when any segment is empty.
fn dashed_method(name: &str) -> Option<String> {
    let segments: Vec<String> = name.split('-').map(capitalize).collect();
    if segments.iter().any(String::is_empty) {
        return None;
    }
    Some(segments.join("."))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Relayer
// ---------------------------------------------------------------------------

/// Delivers decoded events to the application. Shared by every consumption
/// loop.
pub struct Relayer {
    client: Arc<dyn AppClient>,
    routes: RouteTable,
    tracer: Arc<dyn Tracer>,
    timeout: Duration,
}

impl Relayer {
    #[must_use]
    pub fn new(
        client: Arc<dyn AppClient>,
        routes: RouteTable,
        tracer: Arc<dyn Tracer>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            routes,
            tracer,
            timeout,
        }
    }

    /// Relays one delivery of `group`. The span continues the publisher's
    /// trace when the message carries a `traceparent`.
    ///
    /// # Errors
    ///
    /// Returns `Internal` for an undecodable message, a missing route, or an
    /// application failure, and `Timeout` when the application does not
    /// answer in time.
    pub async fn relay(&self, group: &str, message: &BrokerMessage) -> Result<(), SidecarError> {
        let parent = message
            .headers
            .get(TRACEPARENT)
            .and_then(|v| TraceContext::from_traceparent(v));
        let mut span = ActiveSpan::start(
            Arc::clone(&self.tracer),
            &format!("relay.{group}"),
            parent.as_ref(),
        );
        span.add_metadata("group", group);

        let result = self.deliver(&span, message).await;
        span.record_result(&result);
        result
    }

    async fn deliver(&self, span: &ActiveSpan, message: &BrokerMessage) -> Result<(), SidecarError> {
        let event = Event::from_broker_bytes(&message.body)
            .map_err(|e| SidecarError::internal(format!("failed to decode event: {e}")))?;
        let route_key = if event.event_name.is_empty() {
            message.topic.as_str()
        } else {
            event.event_name.as_str()
        };
        span.add_metadata("eventName", route_key);

        let target = self.routes.resolve(route_key)?;
        span.add_metadata("target", &target);

        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        match tokio::time::timeout(self.timeout, self.client.call(&target, &event, span.context()))
            .await
        {
            Ok(result) => result.map_err(SidecarError::from),
            Err(_elapsed) => Err(RelayError::Timeout { timeout_ms }.into()),
        }
    }
}

#[async_trait]
impl DeliveryHandler for Relayer {
    async fn handle(&self, group: &str, message: BrokerMessage) {
        match self.relay(group, &message).await {
            Ok(()) => debug!(group = %group, "event relayed"),
            Err(e) => warn!(group = %group, error = %e, "failed to relay event, dropping it"),
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use sidecar_core::SpanStatus;

    use super::*;
    use crate::telemetry::BufferTracer;

    #[test]
    fn explicit_route_wins() {
        let table = RouteTable::new(ServiceProtocol::Http, None)
            .with_routes("orders=/hooks/orders")
            .unwrap();
        assert_eq!(table.resolve("orders").unwrap(), "/hooks/orders");
    }

    #[test]
    fn http_derives_path_segments() {
        let table = RouteTable::new(ServiceProtocol::Http, None);
        assert_eq!(table.resolve("orders").unwrap(), "/orders");
        assert_eq!(table.resolve("orders.created").unwrap(), "/orders/created");
    }

    #[test]
    fn rpc_derives_method_from_relay_service() {
        let table = RouteTable::new(ServiceProtocol::Grpc, Some("Go".into()));
        assert_eq!(table.resolve("a").unwrap(), "Go.A");
        assert_eq!(table.resolve("orders").unwrap(), "Go.Orders");
    }

    #[test]
    fn rpc_without_relay_service_has_no_route() {
        let table = RouteTable::new(ServiceProtocol::Rpc, None);
        assert!(matches!(
            table.resolve("orders"),
            Err(RelayError::RouteNotFound { event_name }) if event_name == "orders"
        ));
    }

    #[test]
    fn rpc_splits_dashed_names_into_service_and_method() {
        let table = RouteTable::new(ServiceProtocol::Rpc, None);
        assert_eq!(table.resolve("go-a").unwrap(), "Go.A");
        assert_eq!(table.resolve("billing-invoice-paid").unwrap(), "Billing.Invoice.Paid");

        let with_service = RouteTable::new(ServiceProtocol::Grpc, Some("Other".into()));
        assert_eq!(with_service.resolve("go-b").unwrap(), "Go.B");

        for malformed in ["go-", "-a", "go--a"] {
            assert!(matches!(
                table.resolve(malformed),
                Err(RelayError::RouteNotFound { .. })
            ));
        }
    }

    #[test]
    fn dashed_names_stay_paths_over_http() {
        let table = RouteTable::new(ServiceProtocol::Http, None);
        assert_eq!(table.resolve("go-a").unwrap(), "/go-a");
    }

    #[test]
    fn explicit_route_for_rpc_without_relay_service() {
        let mut table = RouteTable::new(ServiceProtocol::Rpc, None);
        table.insert("go-a", "Handlers.GoA");
        assert_eq!(table.resolve("go-a").unwrap(), "Handlers.GoA");
    }

    #[test]
    fn malformed_routes_rejected() {
        assert!(RouteTable::new(ServiceProtocol::Http, None)
            .with_routes("orders")
            .is_err());
        assert!(RouteTable::new(ServiceProtocol::Http, None)
            .with_routes("=/x")
            .is_err());
    }

    // -- Relayer --

    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<(String, Event, TraceContext)>>,
        delay: Duration,
    }

    #[async_trait]
    impl AppClient for RecordingClient {
        async fn call(
            &self,
            target: &str,
            event: &Event,
            trace: &TraceContext,
        ) -> Result<(), RelayError> {
            tokio::time::sleep(self.delay).await;
            self.calls
                .lock()
                .push((target.to_string(), event.clone(), trace.clone()));
            Ok(())
        }
    }

    fn relayer(client: Arc<RecordingClient>, timeout: Duration) -> (Relayer, Arc<BufferTracer>) {
        let tracer = Arc::new(BufferTracer::new(16));
        let relayer = Relayer::new(
            client,
            RouteTable::new(ServiceProtocol::Http, None),
            tracer.clone(),
            timeout,
        );
        (relayer, tracer)
    }

    fn delivery(event: &Event) -> BrokerMessage {
        BrokerMessage::new(event.event_name.clone(), event.to_broker_bytes().unwrap())
    }

    #[tokio::test]
    async fn relays_to_derived_route_in_publisher_trace() {
        let client = Arc::new(RecordingClient::default());
        let (relayer, tracer) = relayer(client.clone(), Duration::from_secs(1));

        let publisher = TraceContext::new_root();
        let event = Event::new("orders", br#"{"id":1}"#.to_vec());
        let mut message = delivery(&event);
        message
            .headers
            .insert(TRACEPARENT.to_string(), publisher.to_traceparent());

        relayer.relay("orders", &message).await.unwrap();

        let calls = client.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "/orders");
        assert_eq!(calls[0].1, event);
        assert_eq!(calls[0].2.trace_id, publisher.trace_id);

        let spans = tracer.recent(None, None);
        assert_eq!(spans[0].name, "relay.orders");
        assert_eq!(spans[0].status, SpanStatus::Ok);
        assert_eq!(spans[0].parent_id.as_deref(), Some(publisher.span_id.as_str()));
    }

    #[tokio::test]
    async fn undecodable_message_is_an_error_span() {
        let client = Arc::new(RecordingClient::default());
        let (relayer, tracer) = relayer(client.clone(), Duration::from_secs(1));

        let err = relayer
            .relay("orders", &BrokerMessage::new("orders", b"garbage".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, SidecarError::Internal(_)));
        assert!(client.calls.lock().is_empty());
        assert_eq!(tracer.recent(None, None)[0].status, SpanStatus::Error);
    }

    #[tokio::test]
    async fn slow_application_times_out() {
        let client = Arc::new(RecordingClient {
            delay: Duration::from_millis(200),
            ..RecordingClient::default()
        });
        let (relayer, _tracer) = relayer(client, Duration::from_millis(20));

        let err = relayer
            .relay("orders", &delivery(&Event::new("orders", Vec::new())))
            .await
            .unwrap_err();
        assert_eq!(err, SidecarError::Timeout { timeout_ms: 20 });
    }
}
