//! Protocol-agnostic service registration.
//!
//! A [`ServiceRegistrationOption`] knows how to attach one service to either
//! server. The same list of options is handed to the RPC server and to the
//! gateway; each applies every option against its own [`RegistrationTarget`]
//! variant, so a service registered once is reachable over both protocols.

mod error;
pub mod health;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::gateway::GatewayMux;
use crate::grpc::RpcRegistrar;
use crate::startup::DependencyContext;

pub use error::RegistrationError;

/// The server an option is being applied to
pub enum RegistrationTarget<'a> {
    Rpc(&'a mut RpcRegistrar),
    Gateway(&'a mut GatewayMux),
}

impl RegistrationTarget<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            RegistrationTarget::Rpc(_) => "rpc",
            RegistrationTarget::Gateway(_) => "gateway",
        }
    }

    fn reborrow(&mut self) -> RegistrationTarget<'_> {
        match self {
            RegistrationTarget::Rpc(registrar) => RegistrationTarget::Rpc(&mut **registrar),
            RegistrationTarget::Gateway(mux) => RegistrationTarget::Gateway(&mut **mux),
        }
    }
}

type RegisterFn = dyn Fn(RegistrationTarget<'_>) -> Result<(), RegistrationError> + Send + Sync;

/// Named capability that attaches a service's handlers to a server
#[derive(Clone)]
pub struct ServiceRegistrationOption {
    name: Arc<str>,
    register: Arc<RegisterFn>,
}

impl ServiceRegistrationOption {
    pub fn new<F>(name: impl AsRef<str>, register: F) -> Self
    where
        F: Fn(RegistrationTarget<'_>) -> Result<(), RegistrationError> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.as_ref()),
            register: Arc::new(register),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, target: RegistrationTarget<'_>) -> Result<(), RegistrationError> {
        (self.register)(target)
    }
}

impl fmt::Debug for ServiceRegistrationOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistrationOption")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Apply options in order, stopping at the first failure.
///
/// Returns the names of the applied options.
pub fn apply_options(
    options: &[ServiceRegistrationOption],
    mut target: RegistrationTarget<'_>,
) -> Result<Vec<String>, RegistrationError> {
    let mut applied = Vec::with_capacity(options.len());
    for option in options {
        option.apply(target.reborrow())?;
        debug!(option = option.name(), target = target.kind(), "Registered service");
        applied.push(option.name().to_string());
    }
    Ok(applied)
}

/// Every service this process exposes, in registration order.
///
/// Both servers receive this same list.
pub fn register_services(ctx: &DependencyContext) -> Vec<ServiceRegistrationOption> {
    vec![health::health_option(Some(ctx.database.clone()))]
}
