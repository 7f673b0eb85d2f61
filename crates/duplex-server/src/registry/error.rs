use thiserror::Error;

/// Reasons a service registration option can be refused by a server
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("service '{0}' is already registered")]
    DuplicateService(String),

    #[error("invalid file descriptor set: {0}")]
    InvalidDescriptorSet(String),

    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: String, path: String },

    #[error("route path '{0}' must be absolute")]
    RelativePath(String),

    #[error("route path '{path}' is not a valid template: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("registration option '{option}' failed: {reason}")]
    Rejected { option: String, reason: String },
}

impl RegistrationError {
    /// Failure raised by an option itself rather than by the server.
    pub fn rejected(option: impl Into<String>, reason: impl Into<String>) -> Self {
        RegistrationError::Rejected {
            option: option.into(),
            reason: reason.into(),
        }
    }
}
