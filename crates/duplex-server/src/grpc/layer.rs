//! Cross-cutting concerns applied to every gRPC call.

use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
use tonic::{Code, Request, Status};
use tower::{Layer, Service};
use tracing::{info, warn};

/// Metadata key carrying the correlation id of a call
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Stamp a request id on calls that arrive without one.
pub fn request_id_interceptor(mut request: Request<()>) -> Result<Request<()>, Status> {
    if request.metadata().get(REQUEST_ID_HEADER).is_none() {
        let value = uuid::Uuid::new_v4()
            .to_string()
            .parse()
            .map_err(|_| Status::internal("failed to encode request id"))?;
        request.metadata_mut().insert(REQUEST_ID_HEADER, value);
    }
    Ok(request)
}

/// Logs method, status and latency of each call, unary and streaming alike.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer;

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for LoggingService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: http::Request<ReqBody>) -> Self::Future {
        let method = request.uri().path().to_string();
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let started = Instant::now();
        let future = self.inner.call(request);

        Box::pin(async move {
            let result = future.await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            match &result {
                Ok(response) => {
                    // Streaming calls report their final status in trailers;
                    // only trailers-only responses carry it in the headers.
                    let code = response_code(response.headers());
                    if code == Code::Ok {
                        info!(%method, %request_id, elapsed_ms, "gRPC call");
                    } else {
                        warn!(%method, %request_id, elapsed_ms, code = ?code, "gRPC call failed");
                    }
                }
                Err(_) => {
                    warn!(%method, %request_id, elapsed_ms, "gRPC transport failure");
                }
            }
            result
        })
    }
}

fn response_code(headers: &http::HeaderMap) -> Code {
    headers
        .get("grpc-status")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i32>().ok())
        .map(Code::from)
        .unwrap_or(Code::Ok)
}
