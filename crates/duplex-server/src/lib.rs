//! Duplex Server - one service contract served over gRPC and JSON/HTTP
//!
//! Services are described once as [`ServiceRegistrationOption`]s. The same
//! list is handed to the [`RpcServer`] and to the [`GatewayServer`]; the
//! gateway forwards every HTTP call to the RPC server over a loopback channel.

pub mod error;
pub mod gateway;
pub mod grpc;
pub mod lifecycle;
pub mod registry;
pub mod startup;

pub use error::StartError;
pub use gateway::GatewayServer;
pub use grpc::RpcServer;
pub use lifecycle::ServerState;
pub use registry::{
    RegistrationError, RegistrationTarget, ServiceRegistrationOption, apply_options,
    register_services,
};
pub use startup::{DependencyContext, InitError, initialize_dependencies};
