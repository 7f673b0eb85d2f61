//! Error codes for client-visible failures
//!
//! Every error surfaced to an end user carries one of these codes so that
//! clients can branch on a stable number instead of parsing messages.

use serde::{Deserialize, Serialize};

/// gRPC metadata key carrying the numeric [`ErrorCode`] of a failed call
pub const ERROR_CODE_METADATA_KEY: &str = "x-error-code";

/// Error code structure for API responses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const PARAMETER_MISSING: ErrorCode<'static> = ErrorCode {
    code: 10000,
    message: "parameter missing",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

// End-user field validation
pub const NO_EMAIL_ADDRESS: ErrorCode<'static> = ErrorCode {
    code: 20101,
    message: "email address is required",
};

pub const INVALID_EMAIL_ADDRESS: ErrorCode<'static> = ErrorCode {
    code: 20102,
    message: "invalid email address",
};

pub const NO_PASSWORD: ErrorCode<'static> = ErrorCode {
    code: 20103,
    message: "password cannot be empty",
};

pub const INVALID_PASSWORD: ErrorCode<'static> = ErrorCode {
    code: 20104,
    message: "password must be at least 8 characters long and may contain at least one special character",
};

pub const NO_PHONE_NUMBER: ErrorCode<'static> = ErrorCode {
    code: 20105,
    message: "phone number is required",
};

pub const INVALID_PHONE_NUMBER: ErrorCode<'static> = ErrorCode {
    code: 20106,
    message: "invalid phone number",
};

pub const PHONE_NUMBER_DIAL_CODE: ErrorCode<'static> = ErrorCode {
    code: 20107,
    message: "country code is required",
};

// Gateway translation
pub const ROUTE_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 20004,
    message: "resource not found",
};

pub const MALFORMED_REQUEST_BODY: ErrorCode<'static> = ErrorCode {
    code: 20003,
    message: "request body is not valid JSON",
};

pub const SERVER_ERROR: ErrorCode<'static> = ErrorCode {
    code: 30000,
    message: "server error",
};
