use std::{sync::Arc, time::Duration};

use shared::{
    domain::{ActivityId, CommandId, DeviceName, MediaAction, NavAction, StatusQuery},
    error::ClickerError,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    build_device, fetch_activities, is_configured, refresh_all, ActivityCatalog, ClientSettings,
    Command, CommandTask, Device, DeviceRegistry, Partial, Reconciler, RegistryHandle,
    RemoteCall, TaskEngine, TaskEvent, TaskHandle, XmlRpcTransport,
};

/// Entry point for a presentation layer: owns the transport, the device registry
/// and the task engine.
#[derive(Clone)]
pub struct Clicker {
    remote: Arc<dyn RemoteCall>,
    registry: RegistryHandle,
    engine: TaskEngine,
}

impl Clicker {
    pub fn new(remote: Arc<dyn RemoteCall>) -> Self {
        Self {
            engine: TaskEngine::new(Arc::clone(&remote)),
            registry: RegistryHandle::new(),
            remote,
        }
    }

    /// Builds an XML-RPC client. An unconfigured address is not an error here; calls
    /// made through the returned client fail as `ConfigMissing`.
    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ClickerError> {
        let transport = XmlRpcTransport::from_settings(settings)?;
        let clicker = Self::new(Arc::new(transport));
        Ok(match settings.task_deadline() {
            Some(deadline) => clicker.with_deadline(deadline),
            None => clicker,
        })
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.engine = self.engine.with_deadline(deadline);
        self
    }

    pub fn is_configured(&self) -> bool {
        is_configured(self.remote.as_ref())
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn engine(&self) -> &TaskEngine {
        &self.engine
    }

    pub fn reconciler(&self) -> &Reconciler {
        self.engine.reconciler()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.engine.subscribe()
    }

    /// Fetches every device from the server. The registry is left untouched; hand the
    /// result to [`Clicker::apply`] to install it.
    pub async fn refresh(&self) -> Partial<Vec<Device>> {
        refresh_all(self.remote.as_ref()).await
    }

    pub async fn apply(&self, devices: Vec<Device>) -> Arc<DeviceRegistry> {
        self.registry.replace(devices).await
    }

    pub async fn device(&self, name: &str) -> Option<Arc<Device>> {
        self.registry.device(name).await
    }

    /// Returns the registered device, or builds just this one from the server.
    pub async fn load_device(&self, name: &str) -> Result<Arc<Device>, ClickerError> {
        if let Some(device) = self.device(name).await {
            return Ok(device);
        }
        if !self.is_configured() {
            return Err(ClickerError::config_missing());
        }
        let built = build_device(&DeviceName::from(name), self.remote.as_ref()).await?;
        if let Some(err) = &built.error {
            warn!(device = name, error = %err, "device loaded with missing details");
        }
        Ok(Arc::new(built.value))
    }

    pub async fn activities(&self) -> Partial<ActivityCatalog> {
        fetch_activities(self.remote.as_ref()).await
    }

    pub fn press(&self, device: Arc<Device>, button: impl Into<CommandId>) -> TaskHandle {
        self.engine.dispatch(Command::press(device, button))
    }

    /// Switching on a device with selectable inputs also re-reads its input, since
    /// many devices restore their last input on power-up.
    pub fn set_power(&self, device: Arc<Device>, on: bool) -> TaskHandle {
        let follow_up = on
            && device.capabilities().has_inputs()
            && device.supports_status(&StatusQuery::Input);
        let mut task = CommandTask::new(Command::power(Arc::clone(&device), on));
        if follow_up {
            info!(device = %device.name(), "chaining input status after power on");
            task = task.then(CommandTask::new(Command::status(device, StatusQuery::Input)));
        }
        self.engine.submit(task)
    }

    pub fn select_input(&self, device: Arc<Device>, input: impl Into<String>) -> TaskHandle {
        self.engine.dispatch(Command::select_input(device, input))
    }

    pub fn media(
        &self,
        device: Arc<Device>,
        action: MediaAction,
    ) -> Result<TaskHandle, ClickerError> {
        if !device.capabilities().supports_media(action) {
            return Err(ClickerError::generic(format!(
                "{} does not support media command '{action}'",
                device.name()
            )));
        }
        Ok(self.engine.dispatch(Command::media(device, action)))
    }

    pub fn navigate(
        &self,
        device: Arc<Device>,
        action: NavAction,
    ) -> Result<TaskHandle, ClickerError> {
        if !device.capabilities().has_navigation() {
            return Err(ClickerError::generic(format!(
                "{} has no navigation pad",
                device.name()
            )));
        }
        Ok(self.engine.dispatch(Command::navigate(device, action)))
    }

    pub fn query_status(&self, device: Arc<Device>, query: StatusQuery) -> TaskHandle {
        self.engine.dispatch(Command::status(device, query))
    }

    pub fn start_activity(&self, activity: impl Into<ActivityId>) -> TaskHandle {
        self.engine.dispatch(Command::start_activity(activity))
    }

    pub fn power_off(&self) -> TaskHandle {
        self.engine.dispatch(Command::PowerOff)
    }

    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
