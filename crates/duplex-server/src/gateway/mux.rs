//! Route table of the JSON/HTTP gateway.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use actix_web::http::Method;
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tonic::Status;
use tonic::transport::Channel;

use crate::grpc::REQUEST_ID_HEADER;
use crate::registry::RegistrationError;

/// How JSON bodies are read and written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonOptions {
    /// Emit field names exactly as declared (`snake_case`) instead of `lowerCamelCase`
    pub use_proto_names: bool,
    /// Ignore inbound fields the target message does not declare
    pub discard_unknown: bool,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            use_proto_names: true,
            discard_unknown: true,
        }
    }
}

impl JsonOptions {
    /// Decode a request body into a message. A missing body decodes as `{}`.
    pub fn decode<T>(&self, body: &Value) -> Result<T, Status>
    where
        T: DeserializeOwned + Serialize,
    {
        let body = match body {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        let message: T = serde_json::from_value(body.clone())
            .map_err(|e| Status::invalid_argument(format!("invalid request body: {}", e)))?;

        if !self.discard_unknown {
            let known = serde_json::to_value(&message)
                .map_err(|_| Status::internal("failed to encode message"))?;
            if let Some(field) = first_unknown_field(&body, &known) {
                return Err(Status::invalid_argument(format!(
                    "unknown field \"{}\"",
                    field
                )));
            }
        }

        Ok(message)
    }

    /// Shape a response message for the wire.
    pub fn render(&self, value: Value) -> Value {
        if self.use_proto_names {
            value
        } else {
            rename_keys(value, &to_lower_camel)
        }
    }
}

fn first_unknown_field(inbound: &Value, known: &Value) -> Option<String> {
    let (Value::Object(inbound), Value::Object(known)) = (inbound, known) else {
        return None;
    };
    for (key, value) in inbound {
        match known.get(key) {
            None => return Some(key.clone()),
            Some(known_value) => {
                if let Some(nested) = first_unknown_field(value, known_value) {
                    return Some(format!("{}.{}", key, nested));
                }
            }
        }
    }
    None
}

fn rename_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (rename(&k), rename_keys(v, rename)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| rename_keys(v, rename)).collect())
        }
        other => other,
    }
}

fn to_lower_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// A decoded inbound HTTP call, handed to a route's handler
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    method: Method,
    path: String,
    path_params: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Value,
    request_id: String,
    options: JsonOptions,
}

impl GatewayRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: HashMap<String, String>,
        body: Value,
        request_id: impl Into<String>,
        options: JsonOptions,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: HashMap::new(),
            query,
            body,
            request_id: request_id.into(),
            options,
        }
    }

    /// Attach the segments captured by the route's path template.
    pub fn with_path_params(mut self, path_params: HashMap<String, String>) -> Self {
        self.path_params = path_params;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Segment captured by a `{name}` placeholder of the route
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Decode the JSON body with the gateway's [`JsonOptions`].
    pub fn decode<T>(&self) -> Result<T, Status>
    where
        T: DeserializeOwned + Serialize,
    {
        self.options.decode(&self.body)
    }

    /// Wrap a message for the loopback call, carrying the request id along.
    pub fn rpc<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        if let Ok(value) = self.request_id.parse() {
            request.metadata_mut().insert(REQUEST_ID_HEADER, value);
        }
        request
    }
}

/// Translates one HTTP route into a gRPC call on the loopback channel.
#[async_trait]
pub trait GatewayHandler: Send + Sync {
    async fn handle(&self, channel: Channel, request: GatewayRequest) -> Result<Value, Status>;
}

#[async_trait]
impl<F, Fut> GatewayHandler for F
where
    F: Fn(Channel, GatewayRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, Status>> + Send + 'static,
{
    async fn handle(&self, channel: Channel, request: GatewayRequest) -> Result<Value, Status> {
        (self)(channel, request).await
    }
}

pub(crate) struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) handler: Arc<dyn GatewayHandler>,
}

/// HTTP routes registered by the service options
///
/// Paths are actix resource templates: `/v1/users/{id}` captures one segment
/// as `id`, and `{name:regex}` restricts what it matches. When two templates
/// match the same path, the one registered first wins.
pub struct GatewayMux {
    options: JsonOptions,
    routes: Vec<Route>,
}

impl GatewayMux {
    pub fn new(options: JsonOptions) -> Self {
        Self {
            options,
            routes: Vec::new(),
        }
    }

    pub fn options(&self) -> JsonOptions {
        self.options
    }

    /// Bind `handler` to `method path`.
    pub fn handle<H>(
        &mut self,
        method: Method,
        path: impl Into<String>,
        handler: H,
    ) -> Result<&mut Self, RegistrationError>
    where
        H: GatewayHandler + 'static,
    {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(RegistrationError::RelativePath(path));
        }
        if let Err(reason) = check_template(&path) {
            return Err(RegistrationError::InvalidPath { path, reason });
        }
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.path == path)
        {
            return Err(RegistrationError::DuplicateRoute {
                method: method.to_string(),
                path,
            });
        }
        self.routes.push(Route {
            method,
            path,
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    /// Registered `(method, path)` pairs in registration order
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes.iter().map(|r| (&r.method, r.path.as_str()))
    }

    /// Routes grouped by path template, in order of first registration
    pub(crate) fn resources(&self) -> Vec<(&str, Vec<&Route>)> {
        let mut resources: Vec<(&str, Vec<&Route>)> = Vec::new();
        for route in &self.routes {
            match resources.iter_mut().find(|(path, _)| *path == route.path) {
                Some((_, routes)) => routes.push(route),
                None => resources.push((route.path.as_str(), vec![route])),
            }
        }
        resources
    }
}

/// Reject templates the actix router cannot compile.
fn check_template(path: &str) -> Result<(), String> {
    let mut depth = 0usize;
    let mut segment = String::new();
    for c in path.chars() {
        match c {
            '{' => {
                if depth > 0 {
                    segment.push(c);
                }
                depth += 1;
            }
            '}' if depth == 0 => return Err("unbalanced '}'".to_string()),
            '}' => {
                depth -= 1;
                if depth > 0 {
                    segment.push(c);
                    continue;
                }
                let (name, pattern) = segment.split_once(':').unwrap_or((segment.as_str(), ""));
                if name.is_empty() {
                    return Err("placeholder without a name".to_string());
                }
                if !pattern.is_empty() {
                    Regex::new(pattern).map_err(|e| e.to_string())?;
                }
                segment.clear();
            }
            _ if depth > 0 => segment.push(c),
            _ => {}
        }
    }
    if depth > 0 {
        return Err("unbalanced '{'".to_string());
    }
    Ok(())
}
