use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// A value carried by a remote call, either as an argument or a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    /// Unwraps a list result into its textual items. `None` when the value is not a list.
    pub fn into_strings(self) -> Option<Vec<String>> {
        match self {
            Value::Array(items) => Some(items.iter().map(Value::to_string).collect()),
            _ => None,
        }
    }

    pub fn member(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.get(name),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Double(value) => write!(f, "{value}"),
            Value::String(value) => f.write_str(value),
            Value::Array(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Struct(members) => {
                f.write_str("{")?;
                for (idx, (name, value)) in members.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}={value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

/// Remote methods exposed by the device-control server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    DeviceList,
    DeviceInfo,
    DeviceListButtons,
    DeviceListStatusCmds,
    DevicePressButton,
    DeviceGetStatus,
    ActivityList,
    ActivityCurrent,
    ActivityInfo,
    ActivityStart,
    PowerOff,
}

impl Method {
    pub const fn name(self) -> &'static str {
        match self {
            Method::DeviceList => "device_list",
            Method::DeviceInfo => "device_info",
            Method::DeviceListButtons => "device_list_buttons",
            Method::DeviceListStatusCmds => "device_list_status_cmds",
            Method::DevicePressButton => "device_press_button",
            Method::DeviceGetStatus => "device_get_status",
            Method::ActivityList => "activity_list",
            Method::ActivityCurrent => "activity_current",
            Method::ActivityInfo => "activity_info",
            Method::ActivityStart => "activity_start",
            Method::PowerOff => "power_off",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
