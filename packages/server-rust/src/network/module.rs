//! Network module with deferred startup lifecycle.
//!
//! `new()` builds the three adapters, `start()` binds every listener, and
//! `serve()` spawns one task per listener. Binding before serving lets the
//! caller learn OS-assigned ports and fail fast on a taken port before any
//! request is accepted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::adapter::Adapter;
use super::config::NetworkConfig;
use super::grpc::{self, GrpcCodec};
use super::http::{self, HttpCodec};
use super::rpc::{self, RpcCodec};
use super::shutdown::{shutdown_signalled, ShutdownController};
use crate::service::Pipeline;
use crate::telemetry::Tracer;

/// Addresses the listeners actually bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddresses {
    pub http: SocketAddr,
    pub rpc: SocketAddr,
    pub grpc: SocketAddr,
}

struct Listeners {
    http: TcpListener,
    rpc: TcpListener,
    grpc: TcpListener,
}

pub struct NetworkModule {
    config: NetworkConfig,
    http: Arc<Adapter<HttpCodec>>,
    rpc: Arc<Adapter<RpcCodec>>,
    grpc: Arc<Adapter<GrpcCodec>>,
    shutdown: Arc<ShutdownController>,
    listeners: Option<Listeners>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig, pipeline: &Pipeline, tracer: &Arc<dyn Tracer>) -> Self {
        let shutdown = Arc::new(ShutdownController::new());
        let http = Arc::new(Adapter::new(
            HttpCodec,
            pipeline.clone(),
            Arc::clone(tracer),
            Arc::clone(&shutdown),
        ));
        let rpc = Arc::new(Adapter::new(
            RpcCodec,
            pipeline.clone(),
            Arc::clone(tracer),
            Arc::clone(&shutdown),
        ));
        let grpc = Arc::new(Adapter::new(
            GrpcCodec,
            pipeline.clone(),
            Arc::clone(tracer),
            Arc::clone(&shutdown),
        ));
        Self {
            config,
            http,
            rpc,
            grpc,
            shutdown,
            listeners: None,
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Binds all three listeners.
    ///
    /// # Errors
    ///
    /// Returns an error naming the transport whose address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<BoundAddresses> {
        let http = bind("http", &self.config.http_address).await?;
        let rpc = bind("rpc", &self.config.rpc_address).await?;
        let grpc = bind("grpc", &self.config.grpc_address).await?;

        let addresses = BoundAddresses {
            http: http.local_addr()?,
            rpc: rpc.local_addr()?,
            grpc: grpc.local_addr()?,
        };
        info!(
            http = %addresses.http,
            rpc = %addresses.rpc,
            grpc = %addresses.grpc,
            "listeners bound"
        );

        self.listeners = Some(Listeners { http, rpc, grpc });
        Ok(addresses)
    }

    /// Spawns one task per listener and marks the controller ready.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first.
    pub fn serve(self) -> anyhow::Result<RunningListeners> {
        let Listeners {
            http: http_listener,
            rpc: rpc_listener,
            grpc: grpc_listener,
        } = self
            .listeners
            .context("start() must be called before serve()")?;
        let mut tasks = JoinSet::new();

        let http_router = http::build_router(self.http, &self.config);
        let mut rx = self.shutdown.shutdown_receiver();
        tasks.spawn(async move {
            let result = axum::serve(http_listener, http_router)
                .with_graceful_shutdown(async move { shutdown_signalled(&mut rx).await })
                .await
                .context("http listener failed");
            ("http", result)
        });

        let grpc_router = grpc::build_router(self.grpc, &self.config);
        let mut rx = self.shutdown.shutdown_receiver();
        tasks.spawn(async move {
            let result = axum::serve(grpc_listener, grpc_router)
                .with_graceful_shutdown(async move { shutdown_signalled(&mut rx).await })
                .await
                .context("grpc listener failed");
            ("grpc", result)
        });

        let rx = self.shutdown.shutdown_receiver();
        let rpc_adapter = self.rpc;
        tasks.spawn(async move {
            let result = rpc::serve(rpc_listener, rpc_adapter, rx)
                .await
                .context("rpc listener failed");
            ("rpc", result)
        });

        self.shutdown.set_ready();
        Ok(RunningListeners {
            tasks,
            shutdown: self.shutdown,
        })
    }
}

async fn bind(protocol: &str, address: &str) -> anyhow::Result<TcpListener> {
    TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {protocol} listener on {address}"))
}

/// Handles to the spawned listener tasks.
pub struct RunningListeners {
    tasks: JoinSet<(&'static str, anyhow::Result<()>)>,
    shutdown: Arc<ShutdownController>,
}

impl RunningListeners {
    /// Resolves when the first listener exits, with its result.
    pub async fn first_exit(&mut self) -> anyhow::Result<()> {
        match self.tasks.join_next().await {
            Some(Ok((protocol, result))) => {
                if let Err(e) = &result {
                    warn!(protocol, error = %e, "listener exited with error");
                } else {
                    info!(protocol, "listener exited");
                }
                result
            }
            Some(Err(e)) => Err(anyhow::anyhow!("listener task failed: {e}")),
            None => Ok(()),
        }
    }

    /// Signals shutdown and waits up to `timeout` for every listener and
    /// in-flight request. Returns `false` on timeout.
    pub async fn shutdown(mut self, timeout: Duration) -> bool {
        self.shutdown.trigger_shutdown();

        let tasks = &mut self.tasks;
        let shutdown = &self.shutdown;
        let drained = tokio::time::timeout(timeout, async move {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((protocol, Ok(()))) => info!(protocol, "listener stopped"),
                    Ok((protocol, Err(e))) => warn!(protocol, error = %e, "listener stopped with error"),
                    Err(e) => warn!(error = %e, "listener task failed"),
                }
            }
            shutdown.wait_for_drain(timeout).await
        })
        .await
        .unwrap_or(false);

        if !drained {
            warn!(?timeout, "listeners did not stop in time, abandoning them");
            self.tasks.abort_all();
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::router::tests::memory_facades;
    use crate::service::{build_operation_pipeline, Dispatcher};

    fn module() -> NetworkModule {
        let facades = memory_facades();
        let pipeline = build_operation_pipeline(Dispatcher::new(Arc::clone(&facades)));
        NetworkModule::new(NetworkConfig::default(), &pipeline, &facades.tracer)
    }

    #[test]
    fn serve_requires_start() {
        let err = module().serve().err().unwrap();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn start_binds_three_distinct_ports() {
        let mut module = module();
        let addrs = module.start().await.unwrap();
        assert!(addrs.http.port() > 0);
        assert_ne!(addrs.http.port(), addrs.rpc.port());
        assert_ne!(addrs.rpc.port(), addrs.grpc.port());
    }

    #[tokio::test]
    async fn shutdown_stops_every_listener() {
        let mut module = module();
        module.start().await.unwrap();
        let controller = module.shutdown_controller();
        let running = module.serve().unwrap();

        assert!(running.shutdown(Duration::from_secs(5)).await);
        assert_eq!(
            controller.state(),
            super::super::shutdown::ListenerState::Stopped
        );
    }

    #[tokio::test]
    async fn taken_port_fails_start() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let facades = memory_facades();
        let pipeline = build_operation_pipeline(Dispatcher::new(Arc::clone(&facades)));
        let config = NetworkConfig {
            rpc_address: taken.local_addr().unwrap().to_string(),
            ..NetworkConfig::default()
        };
        let mut module = NetworkModule::new(config, &pipeline, &facades.tracer);
        let err = module.start().await.unwrap_err();
        assert!(err.to_string().contains("rpc"));
    }
}
