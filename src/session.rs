//! Per-session scheduler selection.
//!
//! Each caller session carries a current-scheduler choice resolved against
//! the container. The first registered scheduler becomes the default on
//! first access; an empty container is logged and only becomes an error
//! when a service must actually be produced.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::container::SchedulerServiceContainer;
use crate::error::{ErrorKind, ServiceError};
use crate::service::SchedulerService;

/// Opaque identifier of a caller session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    /// Wrap a session identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The underlying identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-session state: the currently selected scheduler, if any.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    current_scheduler_name: Option<String>,
}

impl SessionData {
    /// The selected scheduler name.
    pub fn current_scheduler_name(&self) -> Option<&str> {
        self.current_scheduler_name.as_deref()
    }
}

/// Resolves the current scheduler service for a caller session.
pub struct SchedulerServiceFinder {
    container: Arc<SchedulerServiceContainer>,
    sessions: RwLock<HashMap<SessionKey, SessionData>>,
}

impl SchedulerServiceFinder {
    /// A finder backed by the given container.
    pub fn new(container: Arc<SchedulerServiceContainer>) -> Self {
        Self {
            container,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The backing container.
    pub fn container(&self) -> &Arc<SchedulerServiceContainer> {
        &self.container
    }

    /// Return the session's data, creating it on first access. A fresh
    /// session starts with the first registered scheduler selected; when
    /// none is registered the absence is logged and the selection left
    /// empty.
    pub fn get_or_create_session_data(&self, key: &SessionKey) -> SessionData {
        let mut sessions = self.sessions.write().expect("session table poisoned");
        let data = sessions.entry(key.clone()).or_default();

        if data.current_scheduler_name.is_none() {
            let names = self.container.scheduler_service_names();
            match names.first() {
                Some(first) => {
                    info!(session = %key, scheduler = %first, "session bound to default scheduler");
                    data.current_scheduler_name = Some(first.clone());
                }
                None => {
                    info!(session = %key, "no scheduler service registered");
                }
            }
        }
        data.clone()
    }

    /// Resolve the session's current scheduler service.
    pub fn find(&self, key: &SessionKey) -> Result<Arc<SchedulerService>, ServiceError> {
        let data = self.get_or_create_session_data(key);
        let name = data.current_scheduler_name().ok_or_else(|| {
            ServiceError::new(
                ErrorKind::NotFound,
                "no scheduler service registered to select from",
            )
        })?;
        self.container.get_scheduler_service(name)
    }

    /// Record an explicit selection for the session, validating the name
    /// against the container.
    pub fn set_current_scheduler(
        &self,
        key: &SessionKey,
        name: impl Into<String>,
    ) -> Result<(), ServiceError> {
        let name = name.into();
        // Fails with NotFound when the name is unknown.
        self.container.get_scheduler_service(&name)?;

        let mut sessions = self.sessions.write().expect("session table poisoned");
        let data = sessions.entry(key.clone()).or_default();
        data.current_scheduler_name = Some(name.clone());
        info!(session = %key, scheduler = %name, "session scheduler selection changed");
        Ok(())
    }

    /// Drop the session's state, e.g. on session expiry.
    pub fn remove_session(&self, key: &SessionKey) {
        self.sessions
            .write()
            .expect("session table poisoned")
            .remove(key);
    }
}
