//! Translation of gRPC failures into HTTP responses.

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use duplex_common::ERROR_CODE_METADATA_KEY;
use duplex_common::error::{ErrorCode, SERVER_ERROR};
use serde_json::{Value, json};
use tonic::{Code, Status};
use tracing::warn;

/// HTTP status for a gRPC status code
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::InvalidArgument | Code::OutOfRange | Code::FailedPrecondition => {
            StatusCode::BAD_REQUEST
        }
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::Cancelled | Code::Unknown | Code::Internal | Code::DataLoss => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// JSON error body: `{"code": <grpc code>, "message": <text>}`, plus
/// `error_code` when the status carries a numeric application code.
pub fn error_body(status: &Status) -> Value {
    let mut body = json!({
        "code": status.code() as i32,
        "message": status.message(),
    });
    let application_code = status
        .metadata()
        .get(ERROR_CODE_METADATA_KEY)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i32>().ok());
    if let (Some(code), Some(map)) = (application_code, body.as_object_mut()) {
        map.insert("error_code".to_string(), json!(code));
    }
    body
}

/// Build the HTTP response for a failed call.
///
/// Server-side faults are reported with a generic message; the detail is
/// logged instead of returned.
pub fn error_response(status: &Status) -> HttpResponse {
    let http = http_status(status.code());
    if http == StatusCode::INTERNAL_SERVER_ERROR {
        warn!(code = ?status.code(), message = status.message(), "Gateway call failed");
        return HttpResponse::build(http).json(coded_body(status.code(), SERVER_ERROR));
    }
    HttpResponse::build(http).json(error_body(status))
}

/// Error body for failures raised by the gateway itself.
pub(crate) fn coded_body(code: Code, error: ErrorCode<'_>) -> Value {
    json!({
        "code": code as i32,
        "message": error.message,
        "error_code": error.code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use duplex_common::ValidationError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Code::InvalidArgument, 400),
            (Code::NotFound, 404),
            (Code::AlreadyExists, 409),
            (Code::PermissionDenied, 403),
            (Code::Unauthenticated, 401),
            (Code::Unavailable, 503),
            (Code::Unimplemented, 501),
            (Code::DeadlineExceeded, 504),
            (Code::Internal, 500),
            (Code::Unknown, 500),
        ];
        for (code, expected) in cases {
            assert_eq!(http_status(code).as_u16(), expected, "{:?}", code);
        }
    }

    #[test]
    fn test_error_body_shape() {
        let body = error_body(&Status::not_found("no such order"));
        assert_eq!(body, json!({"code": 5, "message": "no such order"}));
    }

    #[test]
    fn test_validation_error_carries_application_code() {
        let status: Status = ValidationError::NoEmailAddress.into();
        let body = error_body(&status);
        assert_eq!(body["code"], 3);
        assert_eq!(body["message"], "email address is required");
        assert_eq!(body["error_code"], 20101);
    }

    #[actix_web::test]
    async fn test_internal_detail_is_hidden() {
        let response = error_response(&Status::internal("db password is hunter2"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], SERVER_ERROR.message);
        assert_eq!(body["error_code"], SERVER_ERROR.code);
        assert!(!String::from_utf8_lossy(&bytes).contains("hunter2"));
    }
}
