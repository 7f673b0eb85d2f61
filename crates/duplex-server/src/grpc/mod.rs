//! gRPC side of the server: route registration, call logging and the listener.

mod layer;
mod registrar;
mod server;

pub use layer::{LoggingLayer, LoggingService, REQUEST_ID_HEADER, request_id_interceptor};
pub use registrar::RpcRegistrar;
pub use server::RpcServer;
