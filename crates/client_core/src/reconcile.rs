use std::sync::Arc;

use serde::Serialize;
use shared::{
    domain::{PowerAction, StatusQuery, INPUT_PREFIX},
    error::ClickerError,
    protocol::{Method, Value},
};
use tracing::{debug, info, warn};

use crate::{call_method, task::TaskOutcome, Command, Device, RemoteCall};

/// Result of [`Reconciler::select_input`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InputSelection {
    /// The server already reported the target input; nothing was pressed.
    AlreadySelected,
    Switched { previous: String },
}

impl InputSelection {
    pub fn switched(&self) -> bool {
        matches!(self, InputSelection::Switched { .. })
    }
}

/// Aligns local control state with what the server reports.
#[derive(Clone)]
pub struct Reconciler {
    remote: Arc<dyn RemoteCall>,
}

impl Reconciler {
    pub fn new(remote: Arc<dyn RemoteCall>) -> Self {
        Self { remote }
    }

    pub fn remote(&self) -> &dyn RemoteCall {
        self.remote.as_ref()
    }

    pub async fn press(&self, device: &Device, button: &str) -> Result<Value, ClickerError> {
        info!(device = %device.name(), button, "pressing button");
        call_method(
            self.remote(),
            Method::DevicePressButton,
            vec![Value::from(device.name().as_str()), Value::from(button)],
        )
        .await
    }

    /// Runs `device_get_status` for `query`, or returns `None` without a call when the
    /// device does not advertise that status command.
    pub async fn query_status(
        &self,
        device: &Device,
        query: &StatusQuery,
    ) -> Result<Option<Value>, ClickerError> {
        if !device.supports_status(query) {
            debug!(device = %device.name(), query = %query, "status query not supported");
            return Ok(None);
        }
        let value = call_method(
            self.remote(),
            Method::DeviceGetStatus,
            vec![Value::from(device.name().as_str()), Value::from(query.key())],
        )
        .await?;
        debug!(device = %device.name(), query = %query, value = %value, "status received");
        Ok(Some(value))
    }

    /// `false` when the device has no power status command.
    pub async fn reconcile_power(&self, device: &Device) -> Result<bool, ClickerError> {
        Ok(self
            .query_status(device, &StatusQuery::Power)
            .await?
            .is_some_and(|value| value.to_string() == PowerAction::On.command_id()))
    }

    /// Empty when the device has no input status command.
    pub async fn reconcile_input(&self, device: &Device) -> Result<String, ClickerError> {
        Ok(self
            .query_status(device, &StatusQuery::Input)
            .await?
            .map(|value| value.to_string())
            .unwrap_or_default())
    }

    /// Switches `device` to `target` unless the server already reports it selected.
    pub async fn select_input(
        &self,
        device: &Device,
        target: &str,
    ) -> Result<InputSelection, ClickerError> {
        let current = self.reconcile_input(device).await?;
        if current == target {
            debug!(device = %device.name(), input = target, "input already selected");
            return Ok(InputSelection::AlreadySelected);
        }
        if !device.capabilities().has_input(target) {
            warn!(
                device = %device.name(),
                input = target,
                "selecting an input the device does not list"
            );
        }
        self.press(device, &format!("{INPUT_PREFIX}{target}")).await?;
        Ok(InputSelection::Switched { previous: current })
    }
}

/// Last known power and input state of one device, as shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControlState {
    pub power: Option<bool>,
    pub selected_input: Option<String>,
}

impl ControlState {
    pub fn set_power(&mut self, on: bool) -> bool {
        let changed = self.power != Some(on);
        self.power = Some(on);
        changed
    }

    /// Records the selected input. Inputs the device does not list clear the selection.
    pub fn set_selected_input(&mut self, device: &Device, input: &str) -> bool {
        let next = device
            .capabilities()
            .has_input(input)
            .then(|| input.to_string());
        let changed = self.selected_input != next;
        self.selected_input = next;
        changed
    }

    /// Folds a resolved command into the state. Returns whether anything changed.
    pub fn absorb(&mut self, command: &Command, outcome: &TaskOutcome) -> bool {
        let Ok(value) = outcome else {
            return false;
        };
        match command {
            Command::GetStatus { device, query } => match (query, value) {
                (_, Value::Nil) => false,
                (StatusQuery::Power, Value::Bool(on)) => self.set_power(*on),
                (StatusQuery::Power, value) => {
                    self.set_power(value.to_string() == PowerAction::On.command_id())
                }
                (StatusQuery::Input, value) => self.set_selected_input(device, &value.to_string()),
                (StatusQuery::Named(_), _) => false,
            },
            Command::PressButton { button, .. } => match button.parse::<PowerAction>() {
                Ok(action) => self.set_power(action == PowerAction::On),
                Err(_) => false,
            },
            Command::SelectInput { device, input } => self.set_selected_input(device, input),
            Command::StartActivity { .. } | Command::PowerOff => false,
        }
    }
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
