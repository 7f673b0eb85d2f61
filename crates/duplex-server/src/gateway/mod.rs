//! JSON/HTTP side of the server: routes that translate HTTP calls into gRPC
//! calls against the local RPC server.

mod error;
mod mux;
mod server;

pub use error::{error_body, error_response, http_status};
pub use mux::{GatewayHandler, GatewayMux, GatewayRequest, JsonOptions};
pub use server::GatewayServer;
