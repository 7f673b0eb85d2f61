use std::convert::Infallible;

use tonic::body::Body;
use tonic::server::NamedService;
use tonic::service::{Routes, RoutesBuilder};
use tower::Service;

use crate::registry::RegistrationError;

/// Collects the gRPC services an option attaches to the RPC server.
///
/// Every file descriptor set added here is also served through reflection.
#[derive(Default)]
pub struct RpcRegistrar {
    routes: RoutesBuilder,
    services: Vec<&'static str>,
    descriptor_sets: Vec<&'static [u8]>,
}

impl RpcRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a generated gRPC server. Service names must be unique.
    pub fn add_service<S>(&mut self, service: S) -> Result<&mut Self, RegistrationError>
    where
        S: Service<http::Request<Body>, Response = http::Response<Body>, Error = Infallible>
            + NamedService
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        if self.services.contains(&S::NAME) {
            return Err(RegistrationError::DuplicateService(S::NAME.to_string()));
        }
        self.routes.add_service(service);
        self.services.push(S::NAME);
        Ok(self)
    }

    /// Register an encoded `FileDescriptorSet` for reflection.
    pub fn add_file_descriptor_set(
        &mut self,
        encoded: &'static [u8],
    ) -> Result<&mut Self, RegistrationError> {
        tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(encoded)
            .build_v1()
            .map_err(|e| RegistrationError::InvalidDescriptorSet(e.to_string()))?;
        self.descriptor_sets.push(encoded);
        Ok(self)
    }

    /// Fully-qualified names of the registered services
    pub fn service_names(&self) -> &[&'static str] {
        &self.services
    }

    /// Add the reflection service and produce the final route table.
    pub(crate) fn finish(mut self) -> Result<Routes, RegistrationError> {
        let mut reflection = tonic_reflection::server::Builder::configure();
        for set in self.descriptor_sets.iter().copied() {
            reflection = reflection.register_encoded_file_descriptor_set(set);
        }
        let reflection = reflection
            .build_v1()
            .map_err(|e| RegistrationError::InvalidDescriptorSet(e.to_string()))?;
        self.add_service(reflection)?;
        Ok(self.routes.routes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_service_is_rejected() {
        let mut registrar = RpcRegistrar::new();
        let (_, health) = tonic_health::server::health_reporter();

        registrar.add_service(health.clone()).unwrap();
        let err = registrar.add_service(health).err().unwrap();

        assert_eq!(
            err,
            RegistrationError::DuplicateService("grpc.health.v1.Health".to_string())
        );
        assert_eq!(registrar.service_names(), ["grpc.health.v1.Health"]);
    }

    #[test]
    fn test_malformed_descriptor_set_is_rejected() {
        let mut registrar = RpcRegistrar::new();
        let err = registrar
            .add_file_descriptor_set(b"\xff\xff\xff\xff")
            .err()
            .unwrap();
        assert!(matches!(err, RegistrationError::InvalidDescriptorSet(_)));
    }

    #[test]
    fn test_finish_adds_reflection() {
        let mut registrar = RpcRegistrar::new();
        registrar
            .add_file_descriptor_set(tonic_health::pb::FILE_DESCRIPTOR_SET)
            .unwrap();
        assert!(registrar.finish().is_ok());
    }
}
