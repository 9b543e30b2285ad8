use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Server-defined command identifier. Compared by exact, case-sensitive equality.
pub type CommandId = String;

/// Prefix marking a command as an input selector (`input_hdmi1` selects `hdmi1`).
pub const INPUT_PREFIX: &str = "input_";

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

name_newtype!(DeviceName);
name_newtype!(ActivityId);

macro_rules! command_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $id:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn command_id(self) -> &'static str {
                match self {
                    $($name::$variant => $id),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.command_id())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.command_id() == value)
                    .ok_or_else(|| {
                        let known: Vec<&str> = Self::ALL.iter().map(|v| v.command_id()).collect();
                        format!(
                            "unknown {} '{value}' (expected one of: {})",
                            stringify!($name),
                            known.join(", ")
                        )
                    })
            }
        }
    };
}

command_enum!(
    /// The two buttons that together make up a power switch.
    PowerAction {
        On => "on",
        Off => "off",
    }
);

command_enum!(
    /// Transport controls of a media player. `Rec` is optional on real devices.
    MediaAction {
        Play => "play",
        Pause => "pause",
        Stop => "stop",
        Rev => "rev",
        Fwd => "fwd",
        Prev => "prev",
        Next => "next",
        Rec => "rec",
    }
);

command_enum!(
    /// Directional pad plus select.
    NavAction {
        Up => "up",
        Down => "down",
        Left => "left",
        Right => "right",
        Select => "select",
    }
);

impl PowerAction {
    pub const fn from_switch(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

impl MediaAction {
    /// Media commands that must all be present for a device to count as a media player.
    pub const REQUIRED: [MediaAction; 7] = [
        MediaAction::Play,
        MediaAction::Pause,
        MediaAction::Stop,
        MediaAction::Rev,
        MediaAction::Fwd,
        MediaAction::Prev,
        MediaAction::Next,
    ];
}

/// A status query a device may advertise through `device_list_status_cmds`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusQuery {
    Power,
    Input,
    Named(String),
}

impl StatusQuery {
    pub fn key(&self) -> &str {
        match self {
            StatusQuery::Power => "power",
            StatusQuery::Input => "input",
            StatusQuery::Named(name) => name,
        }
    }
}

impl From<&str> for StatusQuery {
    fn from(value: &str) -> Self {
        match value {
            "power" => StatusQuery::Power,
            "input" => StatusQuery::Input,
            other => StatusQuery::Named(other.to_string()),
        }
    }
}

impl fmt::Display for StatusQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub description: String,
}
