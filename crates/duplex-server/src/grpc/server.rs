//! gRPC listener.

use std::net::SocketAddr;
use std::time::Duration;

use duplex_common::{Configuration, ServerBinding};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::service::InterceptorLayer;
use tonic::transport::Server;
use tower::ServiceBuilder;
use tracing::{info, warn};

use super::layer::{LoggingLayer, request_id_interceptor};
use super::registrar::RpcRegistrar;
use crate::error::StartError;
use crate::lifecycle::{Lifecycle, ServerState};
use crate::registry::{RegistrationTarget, ServiceRegistrationOption, apply_options};

/// Hosts the registered services over gRPC.
///
/// A server is started at most once. [`RpcServer::stop`] drains in-flight
/// calls for up to the configured shutdown timeout.
pub struct RpcServer {
    binding: ServerBinding,
    shutdown_timeout: Duration,
    lifecycle: Lifecycle,
}

impl RpcServer {
    pub fn new(binding: ServerBinding, shutdown_timeout: Duration) -> Self {
        Self {
            binding,
            shutdown_timeout,
            lifecycle: Lifecycle::new("grpc"),
        }
    }

    pub fn from_config(config: &Configuration) -> Self {
        Self::new(config.grpc.clone(), config.shutdown_timeout)
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    /// Address actually bound, once listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.local_addr()
    }

    /// Wait until the server listens; `None` if it stopped or the wait timed out.
    pub async fn wait_listening(&self, timeout: Duration) -> Option<SocketAddr> {
        self.lifecycle.wait_listening(timeout).await
    }

    /// Register `options`, bind, and serve until stopped.
    ///
    /// The first failing option aborts the start before anything is bound.
    pub async fn start(&self, options: &[ServiceRegistrationOption]) -> Result<(), StartError> {
        self.lifecycle.claim()?;
        let result = self.serve(options).await;
        self.lifecycle.mark_stopped();
        if let Err(e) = &result {
            warn!(error = %e, "gRPC server start failed");
        }
        result
    }

    async fn serve(&self, options: &[ServiceRegistrationOption]) -> Result<(), StartError> {
        let mut registrar = RpcRegistrar::new();
        let applied = apply_options(options, RegistrationTarget::Rpc(&mut registrar))?;
        let routes = registrar.finish()?;

        let address = self.binding.address();
        let listener = bind(&address)?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| StartError::bind(&address, e))?;

        if !self.lifecycle.mark_listening(local_addr) {
            info!("gRPC server stopped before it started listening");
            return Ok(());
        }
        info!(
            address = %local_addr,
            services = ?applied,
            "Starting gRPC server"
        );

        let layer = ServiceBuilder::new()
            .layer(InterceptorLayer::new(request_id_interceptor))
            .layer(LoggingLayer)
            .into_inner();

        let serve = Server::builder()
            .layer(layer)
            .add_routes(routes)
            .serve_with_incoming_shutdown(
                TcpListenerStream::new(listener),
                self.lifecycle.stop_signal(),
            );

        tokio::select! {
            result = serve => result?,
            _ = self.lifecycle.drain_deadline(self.shutdown_timeout) => {
                warn!(
                    "gRPC calls still in flight after {:?}, closing remaining connections",
                    self.shutdown_timeout
                );
            }
        }

        info!("gRPC server stopped");
        Ok(())
    }

    /// Gracefully stop the server. Idempotent, and a no-op before start.
    pub async fn stop(&self) {
        if self.lifecycle.state() == ServerState::Listening {
            info!("Stopping gRPC server");
        }
        self.lifecycle.stop(self.shutdown_timeout).await;
    }
}

fn bind(address: &str) -> Result<tokio::net::TcpListener, StartError> {
    let listener =
        std::net::TcpListener::bind(address).map_err(|e| StartError::bind(address, e))?;
    listener
        .set_nonblocking(true)
        .map_err(|e| StartError::bind(address, e))?;
    tokio::net::TcpListener::from_std(listener).map_err(|e| StartError::bind(address, e))
}
