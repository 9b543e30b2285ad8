use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    error::{ClickerError, TransportError},
    protocol::{Method, Value},
};
use tracing::debug;

pub mod activity;
pub mod capability;
mod client;
pub mod device;
pub mod reconcile;
pub mod registry;
pub mod settings;
pub mod task;
pub mod transport;

pub use activity::{fetch_activities, ActivityCatalog};
pub use capability::{classify, CapabilityModel};
pub use client::Clicker;
pub use device::{build_device, Device};
pub use reconcile::{ControlState, InputSelection, Reconciler};
pub use registry::{refresh_all, DeviceRegistry, RegistryHandle};
pub use settings::{load_settings, ClientSettings};
pub use task::{
    ChainPolicy, Command, CommandTask, TaskEngine, TaskEvent, TaskHandle, TaskId, TaskOutcome,
    TaskState,
};
pub use transport::XmlRpcTransport;

/// Request/response primitive used for every interaction with the server.
#[async_trait]
pub trait RemoteCall: Send + Sync {
    /// Address calls are sent to. `None` or blank means no server is configured.
    fn endpoint(&self) -> Option<&str>;

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, TransportError>;
}

#[async_trait]
impl<T> RemoteCall for Arc<T>
where
    T: RemoteCall + ?Sized,
{
    fn endpoint(&self) -> Option<&str> {
        (**self).endpoint()
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, TransportError> {
        (**self).call(method, args).await
    }
}

pub(crate) fn is_configured(remote: &dyn RemoteCall) -> bool {
    remote
        .endpoint()
        .is_some_and(|endpoint| !endpoint.trim().is_empty())
}

/// A best-effort result: whatever could be built, plus the most recent failure seen.
#[derive(Debug, Clone, PartialEq)]
pub struct Partial<T> {
    pub value: T,
    pub error: Option<ClickerError>,
}

impl<T> Partial<T> {
    pub fn complete(value: T) -> Self {
        Self { value, error: None }
    }

    pub fn failed(value: T, error: ClickerError) -> Self {
        Self {
            value,
            error: Some(error),
        }
    }

    /// Replaces any earlier failure; the last one observed is the one reported.
    pub fn record(&mut self, error: ClickerError) {
        self.error = Some(error);
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<T, ClickerError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.value),
        }
    }
}

pub(crate) async fn call_method(
    remote: &dyn RemoteCall,
    method: Method,
    args: Vec<Value>,
) -> Result<Value, ClickerError> {
    debug!(method = method.name(), args = args.len(), "remote call");
    remote.call(method.name(), args).await.map_err(|err| {
        let err = ClickerError::from(err);
        debug!(
            method = method.name(),
            kind = %err.kind,
            error = %err.message,
            "remote call failed"
        );
        err
    })
}

pub(crate) async fn call_list(
    remote: &dyn RemoteCall,
    method: Method,
    args: Vec<Value>,
) -> Result<Vec<String>, ClickerError> {
    call_method(remote, method, args)
        .await?
        .into_strings()
        .ok_or_else(|| ClickerError::generic(format!("{method} did not return a list")))
}

#[cfg(test)]
pub(crate) mod testing;
