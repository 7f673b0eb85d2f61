//! JSON/HTTP gateway listener.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, middleware::Logger, web};
use duplex_common::error::{MALFORMED_REQUEST_BODY, PARAMETER_VALIDATE_ERROR, ROUTE_NOT_FOUND};
use duplex_common::{Configuration, ServerBinding};
use serde_json::Value;
use tonic::Code;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info, warn};

use super::error::{coded_body, error_response};
use super::mux::{GatewayHandler, GatewayMux, GatewayRequest, JsonOptions};
use crate::error::StartError;
use crate::grpc::REQUEST_ID_HEADER;
use crate::lifecycle::{Lifecycle, ServerState};
use crate::registry::{RegistrationTarget, ServiceRegistrationOption, apply_options};

/// Shared by every route: where calls are forwarded and how JSON is shaped
struct Upstream {
    channel: Channel,
    options: JsonOptions,
}

/// Serves the registered routes over JSON/HTTP, forwarding each call to the
/// RPC server through a lazily connected loopback channel.
pub struct GatewayServer {
    binding: ServerBinding,
    rpc_endpoint: String,
    shutdown_timeout: Duration,
    json: JsonOptions,
    lifecycle: Lifecycle,
}

impl GatewayServer {
    /// `rpc_endpoint` is the URI of the RPC server, e.g. `http://127.0.0.1:50051`.
    pub fn new(
        binding: ServerBinding,
        rpc_endpoint: impl Into<String>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            binding,
            rpc_endpoint: rpc_endpoint.into(),
            shutdown_timeout,
            json: JsonOptions::default(),
            lifecycle: Lifecycle::new("gateway"),
        }
    }

    pub fn from_config(config: &Configuration) -> Self {
        Self::new(
            config.http.clone(),
            config.grpc.loopback_uri(),
            config.shutdown_timeout,
        )
    }

    pub fn with_json_options(mut self, json: JsonOptions) -> Self {
        self.json = json;
        self
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.local_addr()
    }

    pub async fn wait_listening(&self, timeout: Duration) -> Option<SocketAddr> {
        self.lifecycle.wait_listening(timeout).await
    }

    /// Register `options` against the mux, bind, and serve until stopped.
    ///
    /// Must run inside an actix system.
    pub async fn start(&self, options: &[ServiceRegistrationOption]) -> Result<(), StartError> {
        self.lifecycle.claim()?;
        let result = self.serve(options).await;
        self.lifecycle.mark_stopped();
        if let Err(e) = &result {
            warn!(error = %e, "HTTP gateway start failed");
        }
        result
    }

    async fn serve(&self, options: &[ServiceRegistrationOption]) -> Result<(), StartError> {
        let mut mux = GatewayMux::new(self.json);
        let applied = apply_options(options, RegistrationTarget::Gateway(&mut mux))?;

        let channel = Endpoint::from_shared(self.rpc_endpoint.clone())
            .map_err(|source| StartError::Endpoint {
                endpoint: self.rpc_endpoint.clone(),
                source,
            })?
            .connect_lazy();

        let address = self.binding.address();
        let listener =
            std::net::TcpListener::bind(&address).map_err(|e| StartError::bind(&address, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| StartError::bind(&address, e))?;

        if !self.lifecycle.mark_listening(local_addr) {
            info!("HTTP gateway stopped before it started listening");
            return Ok(());
        }
        info!(
            address = %local_addr,
            upstream = %self.rpc_endpoint,
            services = ?applied,
            "Starting HTTP gateway"
        );

        let mux = Arc::new(mux);
        let upstream = web::Data::new(Upstream {
            channel,
            options: self.json,
        });
        let server = HttpServer::new(move || {
            let mux = mux.clone();
            let upstream = upstream.clone();
            App::new()
                .wrap(Logger::default())
                .configure(move |cfg| configure_routes(cfg, &mux, upstream))
        })
        .listen(listener)
        .map_err(|e| StartError::bind(&address, e))?
        .shutdown_timeout(self.shutdown_timeout.as_secs())
        .disable_signals()
        .run();

        let handle = server.handle();
        let stop_signal = self.lifecycle.stop_signal();
        let drain_limit = self.shutdown_timeout;
        let stopper = tokio::spawn(async move {
            stop_signal.await;
            if tokio::time::timeout(drain_limit, handle.stop(true))
                .await
                .is_err()
            {
                warn!(
                    "HTTP requests still in flight after {:?}, closing remaining connections",
                    drain_limit
                );
                handle.stop(false).await;
            }
        });

        let result = server.await.map_err(StartError::Serve);
        stopper.abort();
        info!("HTTP gateway stopped");
        result
    }

    /// Gracefully stop the gateway. Idempotent, and a no-op before start.
    pub async fn stop(&self) {
        if self.lifecycle.state() == ServerState::Listening {
            info!("Stopping HTTP gateway");
        }
        self.lifecycle.stop(self.shutdown_timeout).await;
    }
}

/// Mount every registered route as an actix resource.
///
/// A path with no route for the request's method answers 405, and a path no
/// resource matches answers 404; both keep the JSON error shape.
fn configure_routes(
    cfg: &mut web::ServiceConfig,
    mux: &GatewayMux,
    upstream: web::Data<Upstream>,
) {
    cfg.app_data(upstream);
    for (path, routes) in mux.resources() {
        let mut resource = web::resource(path).default_service(web::to(method_not_allowed));
        for route in routes {
            let handler = route.handler.clone();
            resource = resource.route(web::method(route.method.clone()).to(
                move |req: HttpRequest, body: web::Bytes, upstream: web::Data<Upstream>| {
                    forward(req, body, upstream, handler.clone())
                },
            ));
        }
        cfg.service(resource);
    }
    cfg.default_service(web::to(not_found));
}

async fn forward(
    req: HttpRequest,
    body: web::Bytes,
    upstream: web::Data<Upstream>,
    handler: Arc<dyn GatewayHandler>,
) -> HttpResponse {
    let request_id = request_id(&req);
    let response = match decode_request(&req, &body, &request_id, upstream.options) {
        Err(response) => response,
        Ok(request) => {
            debug!(
                method = %req.method(),
                path = req.path(),
                request_id = %request_id,
                "Forwarding gateway request"
            );
            match handler.handle(upstream.channel.clone(), request).await {
                Ok(value) => HttpResponse::Ok().json(upstream.options.render(value)),
                Err(status) => error_response(&status),
            }
        }
    };
    with_request_id(response, &request_id)
}

async fn not_found(req: HttpRequest) -> HttpResponse {
    with_request_id(
        HttpResponse::NotFound().json(route_error("Not Found")),
        &request_id(&req),
    )
}

async fn method_not_allowed(req: HttpRequest) -> HttpResponse {
    with_request_id(
        HttpResponse::MethodNotAllowed().json(route_error("Method Not Allowed")),
        &request_id(&req),
    )
}

/// The caller's `x-request-id`, or a fresh one
fn request_id(req: &HttpRequest) -> String {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn with_request_id(mut response: HttpResponse, request_id: &str) -> HttpResponse {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

fn decode_request(
    req: &HttpRequest,
    body: &web::Bytes,
    request_id: &str,
    options: JsonOptions,
) -> Result<GatewayRequest, HttpResponse> {
    let query = web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .map_err(|_| {
            HttpResponse::build(StatusCode::BAD_REQUEST)
                .json(coded_body(Code::InvalidArgument, PARAMETER_VALIDATE_ERROR))
        })?
        .into_inner();

    let body = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(body).map_err(|_| {
            HttpResponse::build(StatusCode::BAD_REQUEST)
                .json(coded_body(Code::InvalidArgument, MALFORMED_REQUEST_BODY))
        })?
    };

    let path_params = req
        .match_info()
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    Ok(
        GatewayRequest::new(req.method().clone(), req.path(), query, body, request_id, options)
            .with_path_params(path_params),
    )
}

fn route_error(message: &str) -> Value {
    serde_json::json!({
        "code": Code::Unimplemented as i32,
        "message": message,
        "error_code": ROUTE_NOT_FOUND.code,
    })
}
