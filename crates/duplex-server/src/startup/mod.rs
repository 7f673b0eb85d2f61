//! Process startup: dependency initialization, logging and shutdown signals.

mod dependencies;
mod logging;
mod shutdown;

pub use dependencies::{
    DatabaseConnectionError, DependencyContext, InitError, initialize_dependencies,
    initialize_with,
};
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
