//! Built-in `grpc.health.v1.Health` service, reachable over both protocols.

use std::time::Duration;

use actix_web::http::Method;
use duplex_persistence::DatabaseHandle;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tonic::Status;
use tonic::transport::Channel;
use tonic_health::ServingStatus;
use tonic_health::pb::HealthCheckRequest;
use tonic_health::pb::health_client::HealthClient;
use tracing::{debug, warn};

use super::{RegistrationError, RegistrationTarget, ServiceRegistrationOption};
use crate::gateway::GatewayRequest;

/// Health service name under which the data store's liveness is reported
pub const DATABASE_HEALTH_SERVICE: &str = "duplex.database";

const DATABASE_CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// Registration option for the health service.
///
/// On the RPC side it serves `grpc.health.v1.Health`; the overall (`""`)
/// service reports SERVING while the server is up. When a database handle is
/// given its ping result is published under [`DATABASE_HEALTH_SERVICE`].
/// On the gateway it adds `GET /v1/health?service=` and `POST /v1/health:check`.
pub fn health_option(database: Option<DatabaseHandle>) -> ServiceRegistrationOption {
    ServiceRegistrationOption::new("health", move |target| match target {
        RegistrationTarget::Rpc(registrar) => {
            let (reporter, service) = tonic_health::server::health_reporter();
            registrar
                .add_service(service)?
                .add_file_descriptor_set(tonic_health::pb::FILE_DESCRIPTOR_SET)?;
            if let Some(database) = database.clone() {
                spawn_database_watch(reporter, database)?;
            }
            Ok(())
        }
        RegistrationTarget::Gateway(mux) => {
            mux.handle(Method::GET, "/v1/health", health_query)?
                .handle(Method::POST, "/v1/health:check", health_check)?;
            Ok(())
        }
    })
}

fn spawn_database_watch(
    reporter: tonic_health::server::HealthReporter,
    database: DatabaseHandle,
) -> Result<(), RegistrationError> {
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| RegistrationError::rejected("health", e.to_string()))?;
    runtime.spawn(async move {
        let mut interval = tokio::time::interval(DATABASE_CHECK_INTERVAL);
        loop {
            interval.tick().await;
            let status = database_status(&database).await;
            reporter
                .set_service_status(DATABASE_HEALTH_SERVICE, status)
                .await;
            if database.is_closed() {
                debug!("Database handle closed, ending database health watch");
                break;
            }
        }
    });
    Ok(())
}

/// Liveness of the data store as a health status
pub async fn database_status(database: &DatabaseHandle) -> ServingStatus {
    match database.ping().await {
        Ok(()) => ServingStatus::Serving,
        Err(e) => {
            if !database.is_closed() {
                warn!(error = %e, "Database health check failed");
            }
            ServingStatus::NotServing
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HealthCheckBody {
    #[serde(default)]
    service: String,
}

async fn health_query(channel: Channel, request: GatewayRequest) -> Result<Value, Status> {
    let service = request.query("service").unwrap_or_default().to_string();
    check(channel, &request, service).await
}

async fn health_check(channel: Channel, request: GatewayRequest) -> Result<Value, Status> {
    let body: HealthCheckBody = request.decode()?;
    check(channel, &request, body.service).await
}

async fn check(
    channel: Channel,
    request: &GatewayRequest,
    service: String,
) -> Result<Value, Status> {
    let response = HealthClient::new(channel)
        .check(request.rpc(HealthCheckRequest { service }))
        .await?
        .into_inner();
    Ok(json!({ "status": response.status().as_str_name() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayMux, JsonOptions};
    use crate::grpc::RpcRegistrar;
    use duplex_common::{DatabaseConfig, DatabaseDriver};

    #[test]
    fn test_registers_rpc_service() {
        let mut registrar = RpcRegistrar::new();
        health_option(None)
            .apply(RegistrationTarget::Rpc(&mut registrar))
            .unwrap();
        assert_eq!(registrar.service_names(), ["grpc.health.v1.Health"]);
    }

    #[test]
    fn test_registers_gateway_routes() {
        let mut mux = GatewayMux::new(JsonOptions::default());
        health_option(None)
            .apply(RegistrationTarget::Gateway(&mut mux))
            .unwrap();
        let routes: Vec<_> = mux
            .routes()
            .map(|(method, path)| (method.to_string(), path.to_string()))
            .collect();
        assert_eq!(
            routes,
            vec![
                ("GET".to_string(), "/v1/health".to_string()),
                ("POST".to_string(), "/v1/health:check".to_string()),
            ]
        );
    }

    #[test]
    fn test_applying_twice_to_one_registrar_fails() {
        let option = health_option(None);
        let mut registrar = RpcRegistrar::new();
        option.apply(RegistrationTarget::Rpc(&mut registrar)).unwrap();
        assert!(matches!(
            option.apply(RegistrationTarget::Rpc(&mut registrar)),
            Err(RegistrationError::DuplicateService(_))
        ));
    }

    #[tokio::test]
    async fn test_database_status_follows_handle() {
        let handle = duplex_persistence::connect(&DatabaseConfig::with_url(
            DatabaseDriver::Sqlite,
            "sqlite::memory:",
        ))
        .await
        .unwrap();
        assert_eq!(database_status(&handle).await, ServingStatus::Serving);

        handle.close().await;
        assert_eq!(database_status(&handle).await, ServingStatus::NotServing);
    }

    #[tokio::test]
    async fn test_database_watch_registers_inside_runtime() {
        let handle = duplex_persistence::connect(&DatabaseConfig::with_url(
            DatabaseDriver::Sqlite,
            "sqlite::memory:",
        ))
        .await
        .unwrap();
        let mut registrar = RpcRegistrar::new();
        health_option(Some(handle.clone()))
            .apply(RegistrationTarget::Rpc(&mut registrar))
            .unwrap();
        assert_eq!(registrar.service_names(), ["grpc.health.v1.Health"]);
        handle.close().await;
    }

    #[test]
    fn test_database_watch_requires_runtime() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let handle = runtime
            .block_on(duplex_persistence::connect(&DatabaseConfig::with_url(
                DatabaseDriver::Sqlite,
                "sqlite::memory:",
            )))
            .unwrap();

        let mut registrar = RpcRegistrar::new();
        let err = health_option(Some(handle.clone()))
            .apply(RegistrationTarget::Rpc(&mut registrar))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Rejected { .. }));

        runtime.block_on(handle.close());
    }
}
