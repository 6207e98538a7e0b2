//! Dialogue flow notifications.

use bevy_ecs::message::Message;

use crate::components::narrative::{DialogueChoice, DialogueLine, NarrativeValue};

#[derive(Message, Debug, Clone, PartialEq)]
pub enum DialogueEvent {
    /// A dialogue was started at `line`.
    Start { module_id: String, line: DialogueLine },
    /// The dialogue moved on to `line`.
    Advance { module_id: String, line: DialogueLine },
    /// A choice was accepted (fired before moving to its target line).
    Choice {
        module_id: String,
        choice: DialogueChoice,
    },
    /// The dialogue ended, normally or because a line id did not resolve.
    End { module_id: String },
    /// A story variable changed value.
    VariableChanged {
        module_id: String,
        key: String,
        value: NarrativeValue,
    },
}
