//! Classification of a device's flat command list into capability groups.
//!
//! Groups are extracted in a fixed order (inputs, power, media, navigation) from
//! whatever the previous step left behind. A group is claimed only when every one of
//! its members is present; a partial match leaves all of them as generic buttons.

use serde::{Deserialize, Serialize};
use shared::domain::{CommandId, MediaAction, NavAction, PowerAction, INPUT_PREFIX};

const POWER_GROUP: [&str; 2] = [PowerAction::On.command_id(), PowerAction::Off.command_id()];

const MEDIA_GROUP: [&str; 7] = [
    MediaAction::Play.command_id(),
    MediaAction::Pause.command_id(),
    MediaAction::Stop.command_id(),
    MediaAction::Rev.command_id(),
    MediaAction::Fwd.command_id(),
    MediaAction::Prev.command_id(),
    MediaAction::Next.command_id(),
];

const RECORD_GROUP: [&str; 1] = [MediaAction::Rec.command_id()];

const NAVIGATION_GROUP: [&str; 5] = [
    NavAction::Up.command_id(),
    NavAction::Down.command_id(),
    NavAction::Left.command_id(),
    NavAction::Right.command_id(),
    NavAction::Select.command_id(),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityModel {
    buttons: Vec<CommandId>,
    inputs: Vec<String>,
    has_power: bool,
    has_navigation: bool,
    is_media_player: bool,
    has_record: bool,
}

impl CapabilityModel {
    /// Generic buttons left after every capability group claimed its members.
    pub fn buttons(&self) -> &[CommandId] {
        &self.buttons
    }

    /// Selectable input names, without the `input_` prefix.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn has_inputs(&self) -> bool {
        !self.inputs.is_empty()
    }

    pub fn has_power(&self) -> bool {
        self.has_power
    }

    pub fn has_navigation(&self) -> bool {
        self.has_navigation
    }

    pub fn is_media_player(&self) -> bool {
        self.is_media_player
    }

    pub fn has_record(&self) -> bool {
        self.has_record
    }

    pub fn has_input(&self, input: &str) -> bool {
        self.inputs.iter().any(|candidate| candidate == input)
    }

    pub fn supports_media(&self, action: MediaAction) -> bool {
        match action {
            MediaAction::Rec => self.has_record,
            _ => self.is_media_player,
        }
    }

    /// Command ids removed from the generic list, in group order.
    pub fn claimed_commands(&self) -> Vec<CommandId> {
        let mut claimed: Vec<CommandId> = self
            .inputs
            .iter()
            .map(|input| format!("{INPUT_PREFIX}{input}"))
            .collect();
        let groups: [(bool, &[&str]); 4] = [
            (self.has_power, &POWER_GROUP),
            (self.is_media_player, &MEDIA_GROUP),
            (self.has_record, &RECORD_GROUP),
            (self.has_navigation, &NAVIGATION_GROUP),
        ];
        for (present, members) in groups {
            if present {
                claimed.extend(members.iter().map(|member| member.to_string()));
            }
        }
        claimed
    }
}

pub fn classify<S: AsRef<str>>(commands: &[S]) -> CapabilityModel {
    let mut inputs = Vec::new();
    let mut remaining: Vec<CommandId> = Vec::with_capacity(commands.len());
    for command in commands {
        let command = command.as_ref();
        match command.strip_prefix(INPUT_PREFIX) {
            Some(input) if !input.is_empty() => inputs.push(input.to_string()),
            _ => remaining.push(command.to_string()),
        }
    }

    let has_power = claim_group(&mut remaining, &POWER_GROUP);
    let is_media_player = claim_group(&mut remaining, &MEDIA_GROUP);
    let has_record = is_media_player && claim_group(&mut remaining, &RECORD_GROUP);
    let has_navigation = claim_group(&mut remaining, &NAVIGATION_GROUP);

    CapabilityModel {
        buttons: remaining,
        inputs,
        has_power,
        has_navigation,
        is_media_player,
        has_record,
    }
}

/// Removes the first occurrence of every member, but only when all members are present.
fn claim_group(remaining: &mut Vec<CommandId>, members: &[&str]) -> bool {
    let positions: Option<Vec<usize>> = members
        .iter()
        .map(|member| remaining.iter().position(|command| command == member))
        .collect();
    let Some(mut positions) = positions else {
        return false;
    };
    positions.sort_unstable();
    for idx in positions.into_iter().rev() {
        remaining.remove(idx);
    }
    true
}

#[cfg(test)]
#[path = "tests/capability_tests.rs"]
mod tests;
