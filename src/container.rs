//! Named registry of scheduler services with coordinated lifecycle.
//!
//! Names are assigned at registration and immutable afterwards; enumeration
//! order is registration order. Reads clone out of the registry so callers
//! never iterate under the lock.

use std::sync::{Arc, RwLock};

use tracing::{error, info};

use crate::error::{ErrorKind, ServiceError};
use crate::service::SchedulerService;

/// Registry mapping names to [`SchedulerService`] instances.
pub struct SchedulerServiceContainer {
    /// Pairs in registration order.
    services: RwLock<Vec<(String, Arc<SchedulerService>)>>,
    init_on_add: bool,
}

impl SchedulerServiceContainer {
    /// An empty container; added services are not initialized implicitly.
    pub fn new() -> Self {
        Self {
            services: RwLock::new(Vec::new()),
            init_on_add: false,
        }
    }

    /// Initialize each service as it is added.
    pub fn with_init_on_add(mut self, init_on_add: bool) -> Self {
        self.init_on_add = init_on_add;
        self
    }

    /// Register a service under a unique name. Fails with
    /// [`ErrorKind::DuplicateName`] when the name is taken. With
    /// init-on-add, the service is initialized after being stored and any
    /// failure is surfaced (the registration itself stands).
    pub fn add_scheduler_service(
        &self,
        name: impl Into<String>,
        service: Arc<SchedulerService>,
    ) -> Result<(), ServiceError> {
        let name = name.into();
        {
            let mut services = self.services.write().expect("service registry poisoned");
            if services.iter().any(|(n, _)| n == &name) {
                return Err(ServiceError::new(
                    ErrorKind::DuplicateName,
                    format!("a scheduler service named {} is already registered", name),
                ));
            }
            services.push((name.clone(), Arc::clone(&service)));
        }
        info!(scheduler = %name, "scheduler service registered");

        if self.init_on_add {
            service.init()?;
        }
        Ok(())
    }

    /// Destroy and remove a service. Fails with [`ErrorKind::NotFound`]
    /// when no service is registered under the name.
    pub fn remove_scheduler_service(&self, name: &str) -> Result<(), ServiceError> {
        let service = {
            let mut services = self.services.write().expect("service registry poisoned");
            let index = services.iter().position(|(n, _)| n == name).ok_or_else(|| {
                ServiceError::new(
                    ErrorKind::NotFound,
                    format!("no scheduler service named {}", name),
                )
            })?;
            services.remove(index).1
        };

        service.destroy()?;
        info!(scheduler = %name, "scheduler service removed");
        Ok(())
    }

    /// Look up a service by name.
    pub fn get_scheduler_service(
        &self,
        name: &str,
    ) -> Result<Arc<SchedulerService>, ServiceError> {
        let services = self.services.read().expect("service registry poisoned");
        services
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| Arc::clone(s))
            .ok_or_else(|| {
                ServiceError::new(
                    ErrorKind::NotFound,
                    format!("no scheduler service named {}", name),
                )
            })
    }

    /// All registered names, in registration order.
    pub fn scheduler_service_names(&self) -> Vec<String> {
        let services = self.services.read().expect("service registry poisoned");
        services.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.read().expect("service registry poisoned").len()
    }

    /// Whether no service is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<(String, Arc<SchedulerService>)> {
        self.services
            .read()
            .expect("service registry poisoned")
            .clone()
    }

    /// Initialize every held service in registration order. Stops at the
    /// first failure; services after it are left untouched.
    pub fn init(&self) -> Result<(), ServiceError> {
        for (name, service) in self.snapshot() {
            info!(scheduler = %name, "initializing scheduler service");
            if let Err(e) = service.init() {
                error!(scheduler = %name, error = %e, "scheduler service failed to initialize");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Destroy every held service in registration order. Every service is
    /// attempted even when one fails; the first failure is surfaced after
    /// the sweep.
    pub fn destroy(&self) -> Result<(), ServiceError> {
        let mut first_failure = None;
        for (name, service) in self.snapshot() {
            info!(scheduler = %name, "destroying scheduler service");
            if let Err(e) = service.destroy() {
                error!(scheduler = %name, error = %e, "scheduler service failed to destroy");
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for SchedulerServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}
