//! Input validation for end-user fields
//!
//! Failures are local to a request: they are returned to the caller as a
//! client error carrying a stable [`ErrorCode`] and are never logged as
//! system faults.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::error::{
    ERROR_CODE_METADATA_KEY, ErrorCode, INVALID_EMAIL_ADDRESS, INVALID_PASSWORD, INVALID_PHONE_NUMBER, NO_EMAIL_ADDRESS,
    NO_PASSWORD, NO_PHONE_NUMBER, PHONE_NUMBER_DIAL_CODE,
};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,4}$").expect("Invalid email pattern")
});

static PASSWORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9!@#$&()\-.+]{8,}$").expect("Invalid password pattern")
});

/// Validation failures for end-user input
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("email address is required")]
    NoEmailAddress,

    #[error("invalid email address")]
    InvalidEmailAddress,

    #[error("password cannot be empty")]
    NoPassword,

    #[error(
        "password must be at least 8 characters long and may contain at least one special character"
    )]
    InvalidPassword,

    #[error("phone number is required")]
    NoPhoneNumber,

    #[error("invalid phone number")]
    InvalidPhoneNumber,

    #[error("country code is required")]
    PhoneNumberDialCode,
}

impl ValidationError {
    /// Stable code reported to clients
    pub fn error_code(&self) -> ErrorCode<'static> {
        match self {
            ValidationError::NoEmailAddress => NO_EMAIL_ADDRESS,
            ValidationError::InvalidEmailAddress => INVALID_EMAIL_ADDRESS,
            ValidationError::NoPassword => NO_PASSWORD,
            ValidationError::InvalidPassword => INVALID_PASSWORD,
            ValidationError::NoPhoneNumber => NO_PHONE_NUMBER,
            ValidationError::InvalidPhoneNumber => INVALID_PHONE_NUMBER,
            ValidationError::PhoneNumberDialCode => PHONE_NUMBER_DIAL_CODE,
        }
    }
}

impl From<ValidationError> for tonic::Status {
    fn from(err: ValidationError) -> Self {
        let mut status = tonic::Status::invalid_argument(err.to_string());
        if let Ok(value) = err.error_code().code.to_string().parse() {
            status.metadata_mut().insert(ERROR_CODE_METADATA_KEY, value);
        }
        status
    }
}

/// Validate an email address.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::NoEmailAddress);
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(ValidationError::InvalidEmailAddress);
    }
    Ok(())
}

/// Validate a password: at least 8 characters drawn from letters, digits
/// and `!@#$&()-.+`.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::NoPassword);
    }
    if !PASSWORD_PATTERN.is_match(password) {
        return Err(ValidationError::InvalidPassword);
    }
    Ok(())
}

/// Validate a phone number against a dial code.
///
/// A local number with a leading `0` is rewritten to carry the dial code
/// before matching. Returns the normalized number on success.
///
/// Accepted shapes: `0241234567`, `+233241234567`.
pub fn validate_phone_number(
    phone_number: &str,
    dial_code: &str,
) -> Result<String, ValidationError> {
    if phone_number.is_empty() {
        return Err(ValidationError::NoPhoneNumber);
    }
    if dial_code.is_empty() {
        return Err(ValidationError::PhoneNumberDialCode);
    }

    let normalized = if phone_number.starts_with('0') {
        format!("{}{}", dial_code, phone_number.trim_start_matches('0'))
    } else {
        phone_number.to_string()
    };

    let pattern = Regex::new(&format!(r"^({}|0)[0-9]{{9,12}}$", regex::escape(dial_code)))
        .map_err(|_| ValidationError::PhoneNumberDialCode)?;
    if !pattern.is_match(&normalized) {
        return Err(ValidationError::InvalidPhoneNumber);
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b.com").is_ok());
        assert!(validate_email("sampler@domain.com").is_ok());
        assert_eq!(validate_email(""), Err(ValidationError::NoEmailAddress));
        assert_eq!(validate_email("a@b"), Err(ValidationError::InvalidEmailAddress));
        assert_eq!(
            validate_email("samplerdomain.com"),
            Err(ValidationError::InvalidEmailAddress)
        );
    }

    #[test]
    fn test_validate_email_rejects_uppercase() {
        // Addresses are expected to be lowercased by the caller
        assert_eq!(
            validate_email("Sampler@Domain.com"),
            Err(ValidationError::InvalidEmailAddress)
        );
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("Sampler@2024").is_ok());
        assert_eq!(validate_password(""), Err(ValidationError::NoPassword));
        assert_eq!(validate_password("sampler"), Err(ValidationError::InvalidPassword));
        assert_eq!(
            validate_password("with space 123"),
            Err(ValidationError::InvalidPassword)
        );
    }

    #[test]
    fn test_validate_phone_number() {
        assert_eq!(
            validate_phone_number("0554635701", "+233"),
            Ok("+233554635701".to_string())
        );
        assert_eq!(
            validate_phone_number("+233554635701", "+233"),
            Ok("+233554635701".to_string())
        );
        assert_eq!(
            validate_phone_number("0241234567", ""),
            Err(ValidationError::PhoneNumberDialCode)
        );
        assert_eq!(
            validate_phone_number("", "+233"),
            Err(ValidationError::NoPhoneNumber)
        );
        assert_eq!(
            validate_phone_number("+0554635701", "+233"),
            Err(ValidationError::InvalidPhoneNumber)
        );
    }

    #[test]
    fn test_validation_error_to_status() {
        let status: tonic::Status = ValidationError::InvalidEmailAddress.into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(status.message(), "invalid email address");
        assert_eq!(
            status
                .metadata()
                .get(crate::error::ERROR_CODE_METADATA_KEY)
                .and_then(|v| v.to_str().ok()),
            Some("20102")
        );
    }

    #[test]
    fn test_validation_error_code() {
        assert_eq!(ValidationError::NoEmailAddress.error_code().code, 20101);
        assert_eq!(
            ValidationError::InvalidPassword.error_code().message,
            ValidationError::InvalidPassword.to_string()
        );
    }
}
