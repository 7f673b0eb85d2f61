//! Duplex Common - Shared types and helpers
//!
//! This crate provides the foundational pieces used by every Duplex component:
//! - Process configuration and the sources it is loaded from
//! - Error codes returned to clients
//! - Input validation for end-user fields
//! - Integrity hashing and random code generation

pub mod config;
pub mod crypto;
pub mod error;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use self::config::{
    ConfigError, ConfigSource, Configuration, DatabaseConfig, DatabaseDriver, LoggingSettings,
    ServerBinding,
};
pub use crypto::hash_value;
pub use error::{ERROR_CODE_METADATA_KEY, ErrorCode};
pub use utils::{format_phone_number_with_dial_code, generate_digits, generate_six_digit_otp};
pub use validation::{ValidationError, validate_email, validate_password, validate_phone_number};
