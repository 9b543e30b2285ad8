use std::{collections::HashMap, sync::Arc};

use shared::{domain::DeviceName, error::ClickerError, protocol::Method};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{build_device, call_list, is_configured, Device, Partial, RemoteCall};

/// An immutable, complete set of devices in server order.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Arc<Device>>,
    by_name: HashMap<DeviceName, usize>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<Device>) -> Self {
        let mut by_name = HashMap::with_capacity(devices.len());
        let mut kept = Vec::with_capacity(devices.len());
        for device in devices {
            if by_name.contains_key(device.name()) {
                warn!(device = %device.name(), "ignoring duplicate device name");
                continue;
            }
            by_name.insert(device.name().clone(), kept.len());
            kept.push(Arc::new(device));
        }
        Self {
            devices: kept,
            by_name,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Device>> {
        self.by_name.get(name).map(|idx| &self.devices[*idx])
    }

    pub fn devices(&self) -> &[Arc<Device>] {
        &self.devices
    }

    pub fn names(&self) -> impl Iterator<Item = &DeviceName> {
        self.devices.iter().map(|device| device.name())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Shared handle to the current registry. Readers always observe a complete
/// registry; [`RegistryHandle::replace`] swaps in a new one as a single step.
#[derive(Debug, Clone, Default)]
pub struct RegistryHandle {
    current: Arc<RwLock<Arc<DeviceRegistry>>>,
}

impl RegistryHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Arc<DeviceRegistry> {
        Arc::clone(&*self.current.read().await)
    }

    /// Installs `devices` as the new registry and returns it. The previous registry is
    /// discarded, not merged.
    pub async fn replace(&self, devices: Vec<Device>) -> Arc<DeviceRegistry> {
        let next = Arc::new(DeviceRegistry::new(devices));
        *self.current.write().await = Arc::clone(&next);
        info!(devices = next.len(), "device registry replaced");
        next
    }

    pub async fn device(&self, name: &str) -> Option<Arc<Device>> {
        self.current.read().await.get(name).cloned()
    }
}

/// Lists every device on the server and builds each one.
///
/// Devices that fail to build are left out; the last failure observed is reported
/// alongside the devices that did build. Nothing is applied to any registry here.
pub async fn refresh_all(remote: &dyn RemoteCall) -> Partial<Vec<Device>> {
    if !is_configured(remote) {
        warn!("device refresh skipped: no server address configured");
        return Partial::failed(Vec::new(), ClickerError::config_missing());
    }

    let names = match call_list(remote, Method::DeviceList, Vec::new()).await {
        Ok(names) => names,
        Err(err) => {
            warn!(error = %err, "failed to list devices");
            return Partial::failed(Vec::new(), err);
        }
    };

    let mut outcome = Partial::complete(Vec::with_capacity(names.len()));
    for name in names.into_iter().map(DeviceName::from) {
        match build_device(&name, remote).await {
            Ok(built) => {
                if let Some(err) = built.error {
                    outcome.record(err);
                }
                outcome.value.push(built.value);
            }
            Err(err) => {
                warn!(device = %name, error = %err, "dropping device that failed to build");
                outcome.record(err);
            }
        }
    }

    info!(
        devices = outcome.value.len(),
        complete = outcome.is_complete(),
        "device refresh finished"
    );
    outcome
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
