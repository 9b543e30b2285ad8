use std::collections::BTreeSet;

use serde::Serialize;
use shared::{
    domain::{DeviceName, StatusQuery},
    error::ClickerError,
    protocol::{Method, Value},
};
use tracing::{debug, warn};

use crate::{call_list, call_method, capability::classify, CapabilityModel, Partial, RemoteCall};

/// One remote-controllable unit. Immutable once built; a refresh replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    name: DeviceName,
    description: String,
    capabilities: CapabilityModel,
    status_commands: BTreeSet<String>,
}

impl Device {
    pub fn new<S: AsRef<str>>(
        name: impl Into<DeviceName>,
        description: impl Into<String>,
        buttons: &[S],
        status_commands: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capabilities: classify(buttons),
            status_commands: status_commands.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &DeviceName {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capabilities(&self) -> &CapabilityModel {
        &self.capabilities
    }

    pub fn status_commands(&self) -> &BTreeSet<String> {
        &self.status_commands
    }

    pub fn supports_status(&self, query: &StatusQuery) -> bool {
        self.status_commands.contains(query.key())
    }
}

/// Fetches description, buttons and status commands for `name` and classifies them.
///
/// All three calls are always issued. Failures of the description or status-command
/// calls still yield a device (with an empty description or no status commands) and
/// are reported through [`Partial::error`]; the last failure wins. Without a button
/// list there is no capability model, so that failure is returned as `Err`.
pub async fn build_device(
    name: &DeviceName,
    remote: &dyn RemoteCall,
) -> Result<Partial<Device>, ClickerError> {
    let arg = || vec![Value::from(name.as_str())];

    let info = call_method(remote, Method::DeviceInfo, arg()).await;
    let buttons = call_list(remote, Method::DeviceListButtons, arg()).await;
    let status_commands = call_list(remote, Method::DeviceListStatusCmds, arg()).await;

    let mut last_error = None;
    let description = match info {
        Ok(value) => value.to_string(),
        Err(err) => {
            warn!(device = %name, error = %err, "failed to fetch device description");
            last_error = Some(err);
            String::new()
        }
    };
    let buttons = match buttons {
        Ok(buttons) => Some(buttons),
        Err(err) => {
            warn!(device = %name, error = %err, "failed to fetch device buttons");
            last_error = Some(err);
            None
        }
    };
    let status_commands = match status_commands {
        Ok(commands) => commands,
        Err(err) => {
            warn!(device = %name, error = %err, "failed to fetch device status commands");
            last_error = Some(err);
            Vec::new()
        }
    };

    let Some(buttons) = buttons else {
        return Err(last_error
            .unwrap_or_else(|| ClickerError::generic(format!("no buttons for device {name}"))));
    };

    let device = Device::new(name.clone(), description, &buttons, status_commands);
    debug!(
        device = %name,
        buttons = device.capabilities.buttons().len(),
        inputs = device.capabilities.inputs().len(),
        power = device.capabilities.has_power(),
        media = device.capabilities.is_media_player(),
        navigation = device.capabilities.has_navigation(),
        "device classified"
    );

    Ok(Partial {
        value: device,
        error: last_error,
    })
}

#[cfg(test)]
#[path = "tests/device_tests.rs"]
mod tests;
