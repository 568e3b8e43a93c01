use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rtvi_client_types::RtviMessageInbound;

use crate::client::WeakRtviClient;
use crate::error::{Result, RtviError};

pub mod llm;

/// A handler for the messages of one backend service.
///
/// Helpers are created by [`crate::RtviClient::register_helper`] and receive
/// every inbound message whose type is listed in [`RtviClientHelper::message_types`].
pub trait RtviClientHelper: Any + Send + Sync {
    fn new(service: &str, client: WeakRtviClient) -> Self
    where
        Self: Sized;

    fn handle_message(&self, message: &RtviMessageInbound);

    fn message_types(&self) -> HashSet<String>;
}

struct RegisteredHelper {
    helper: Arc<dyn RtviClientHelper>,
    instance: Arc<dyn Any + Send + Sync>,
    message_types: HashSet<String>,
}

/// Registered helpers keyed by service name.
#[derive(Default)]
pub struct HelperRegistry {
    helpers: HashMap<String, RegisteredHelper>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the helper built by `make` under `service`.
    ///
    /// `make` is only called when the name is free, a taken name leaves the
    /// existing registration untouched.
    pub fn register<T, F>(&mut self, service: &str, make: F) -> Result<Arc<T>>
    where
        T: RtviClientHelper,
        F: FnOnce() -> T,
    {
        if self.helpers.contains_key(service) {
            return Err(RtviError::HelperAlreadyRegistered {
                service: service.to_string(),
            });
        }

        let helper = Arc::new(make());
        let message_types = helper.message_types();
        tracing::debug!("registered helper {} for {:?}", service, message_types);
        self.helpers.insert(
            service.to_string(),
            RegisteredHelper {
                helper: helper.clone(),
                instance: helper.clone(),
                message_types,
            },
        );
        Ok(helper)
    }

    pub fn unregister(&mut self, service: &str) -> Result<()> {
        self.helpers
            .remove(service)
            .map(|_| ())
            .ok_or_else(|| RtviError::HelperNotRegistered {
                service: service.to_string(),
            })
    }

    pub fn get<T: RtviClientHelper>(&self, service: &str) -> Result<Arc<T>> {
        let entry = self
            .helpers
            .get(service)
            .ok_or_else(|| RtviError::HelperNotRegistered {
                service: service.to_string(),
            })?;
        entry
            .instance
            .clone()
            .downcast::<T>()
            .map_err(|_| RtviError::HelperTypeMismatch {
                service: service.to_string(),
            })
    }

    /// Every helper that handles `message_type`.
    pub fn handlers_for(&self, message_type: &str) -> Vec<Arc<dyn RtviClientHelper>> {
        self.helpers
            .values()
            .filter(|entry| entry.message_types.contains(message_type))
            .map(|entry| entry.helper.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}
