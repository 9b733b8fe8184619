//! Process lifecycle: build every component, start the listeners and
//! consumption loops, and tear them down in order on the first listener exit
//! or termination signal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::backends::{build_registry, MemoryBus};
use crate::client::build_client;
use crate::config::SidecarArgs;
use crate::network::{BoundAddresses, NetworkConfig, NetworkModule, RunningListeners};
use crate::service::{
    build_operation_pipeline, ComponentRegistry, Dispatcher, Facades, PublishFacade, Relayer,
    RouteTable, SecretFacade, StateFacade,
};
use crate::telemetry::{BufferTracer, Tracer};

/// A fully wired sidecar whose listeners are not bound yet.
pub struct Sidecar {
    consumer_groups: Vec<String>,
    shutdown_timeout: Duration,
    facades: Arc<Facades>,
    network: NetworkModule,
}

impl Sidecar {
    /// Builds backends, relay client, facades, and adapters from `args`.
    ///
    /// # Errors
    ///
    /// Fails on an unsupported backend kind, a backend that cannot connect,
    /// or a malformed route table. Nothing is listening when this fails.
    pub async fn build(args: &SidecarArgs) -> anyhow::Result<Self> {
        let bus = Arc::new(MemoryBus::new());
        let registry = build_registry(args, bus).await?;
        Self::with_registry(args, registry)
    }

    /// Like [`Sidecar::build`], over backends registered by the caller
    /// instead of the ones `args` names.
    ///
    /// # Errors
    ///
    /// Fails on a malformed route table.
    pub fn with_registry(args: &SidecarArgs, registry: ComponentRegistry) -> anyhow::Result<Self> {
        let tracer: Arc<dyn Tracer> = Arc::new(BufferTracer::new(args.trace_buffer));
        let registry = Arc::new(registry);

        let client = build_client(args.service_protocol, &args.service_name, args.service_port);
        let routes = RouteTable::new(args.service_protocol, args.relay_service.clone())
            .with_routes(&args.routes)
            .context("invalid route table")?;
        let relayer = Arc::new(Relayer::new(
            client,
            routes,
            Arc::clone(&tracer),
            args.relay_timeout(),
        ));

        let facades = Arc::new(Facades {
            state: StateFacade::new(Arc::clone(&registry), Arc::clone(&tracer)),
            secret: SecretFacade::new(Arc::clone(&registry), Arc::clone(&tracer)),
            publish: Arc::new(PublishFacade::new(registry, Arc::clone(&tracer), relayer)),
            tracer: Arc::clone(&tracer),
        });

        let pipeline = build_operation_pipeline(Dispatcher::new(Arc::clone(&facades)));
        let network = NetworkModule::new(NetworkConfig::from_args(args), &pipeline, &tracer);

        info!(
            protocol = args.service_protocol.as_str(),
            service = %format!("{}:{}", args.service_name, args.service_port),
            "sidecar built"
        );
        Ok(Self {
            consumer_groups: args.consumer_groups(),
            shutdown_timeout: args.shutdown_timeout(),
            facades,
            network,
        })
    }

    #[must_use]
    pub fn facades(&self) -> &Arc<Facades> {
        &self.facades
    }

    /// Binds the listeners, subscribes every consumer group, then starts
    /// serving.
    ///
    /// # Errors
    ///
    /// Fails when a listener cannot bind or a consumer group cannot be
    /// subscribed. Groups subscribed before the failure are released.
    pub async fn start(mut self) -> anyhow::Result<RunningSidecar> {
        let addresses = self.network.start().await?;

        for group in &self.consumer_groups {
            if let Err(e) = self.facades.publish.subscribe(group).await {
                self.facades.publish.unsubscribe_all().await;
                return Err(e).with_context(|| format!("failed to subscribe consumer group {group}"));
            }
        }

        let listeners = self.network.serve()?;
        info!(groups = ?self.consumer_groups, "sidecar started");
        Ok(RunningSidecar {
            addresses,
            shutdown_timeout: self.shutdown_timeout,
            facades: self.facades,
            listeners,
        })
    }
}

/// A serving sidecar.
pub struct RunningSidecar {
    addresses: BoundAddresses,
    shutdown_timeout: Duration,
    facades: Arc<Facades>,
    listeners: RunningListeners,
}

impl RunningSidecar {
    #[must_use]
    pub fn addresses(&self) -> BoundAddresses {
        self.addresses
    }

    #[must_use]
    pub fn facades(&self) -> &Arc<Facades> {
        &self.facades
    }

    /// Serves until a listener exits or `signal` resolves, then stops.
    ///
    /// # Errors
    ///
    /// Returns the error of a listener that failed on its own.
    pub async fn run_until(mut self, signal: impl Future<Output = ()>) -> anyhow::Result<()> {
        let outcome = tokio::select! {
            result = self.listeners.first_exit() => result,
            () = signal => {
                info!("shutdown signal received");
                Ok(())
            }
        };
        self.stop().await;
        outcome
    }

    /// Releases every subscription, then stops the listeners. Both steps
    /// share one deadline of the configured shutdown timeout.
    pub async fn stop(self) {
        let deadline = Instant::now() + self.shutdown_timeout;
        let released =
            tokio::time::timeout_at(deadline, self.facades.publish.unsubscribe_all()).await;
        if released.is_err() {
            warn!(timeout = ?self.shutdown_timeout, "consumer groups did not unsubscribe in time");
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if self.listeners.shutdown(remaining).await {
            info!("successfully stopped sidecar");
        } else {
            warn!("sidecar stopped with listeners still running");
        }
    }
}

/// Runs the sidecar until SIGINT or SIGTERM.
///
/// # Errors
///
/// Startup failures and listener failures.
pub async fn run(args: &SidecarArgs) -> anyhow::Result<()> {
    Sidecar::build(args)
        .await?
        .start()
        .await?
        .run_until(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => warn!(?err, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
