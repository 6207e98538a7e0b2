//! Narrative module: dialogue graph traversal, choices and story variables.
//!
//! Dialogue lines form a directed graph over their ids. A line either offers
//! [`DialogueChoice`]s (the caller must pick one with
//! [`NarrativeModule::select_choice`]) or points to the next line through
//! `next_id`; a line with neither ends the dialogue on
//! [`NarrativeModule::advance`]. An id that does not resolve always ends the
//! dialogue instead of failing.
//!
//! # Conditions and actions
//!
//! Choices may carry a condition and an action written in a tiny language
//! over the story variables:
//!
//! ```text
//! met_hero == true        gold >= 10        mood != "angry"
//! set:met_hero=true       add:gold=-5
//! ```
//!
//! A condition is one `key OP value` comparison with `OP` one of
//! `== != >= <= > <`. The value is read as a boolean, then a number, then a
//! string (quotes stripped). `==`/`!=` compare type and value; the ordering
//! operators compare numerically and are false when either side is not a
//! number. A condition that does not parse passes.
//!
//! # Related
//!
//! - [`crate::resources::conditions`] – entity-level predicates (`InDialogue`, `VarEquals`, ...)

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;

use bevy_ecs::prelude::Component;
use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::components::module::{Module, ModuleError, Outbox};
use crate::components::record::{self, FieldAlias, RecordReader, pascal_keys};
use crate::events::narrative::DialogueEvent;

const DIALOGUES: FieldAlias = FieldAlias::new("dialogues", "Dialogues");
const CURRENT_DIALOGUE_ID: FieldAlias = FieldAlias::new("currentDialogueId", "CurrentDialogueId");
const VARIABLES: FieldAlias = FieldAlias::new("variables", "Variables");
const HISTORY: FieldAlias = FieldAlias::new("history", "History");
pub const MAX_HISTORY_LENGTH: FieldAlias = FieldAlias::new("maxHistoryLength", "MaxHistoryLength");
const AUTO_MODE: FieldAlias = FieldAlias::new("autoMode", "AutoMode");
const SKIP_MODE: FieldAlias = FieldAlias::new("skipMode", "SkipMode");

pub const DEFAULT_MAX_HISTORY_LENGTH: usize = 100;

/// Longest first so `>=` is not read as `>`.
const OPERATORS: [&str; 6] = ["==", "!=", ">=", "<=", ">", "<"];

/// A story variable value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NarrativeValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl NarrativeValue {
    /// Read a literal: `true`/`false`, then a finite number, else text.
    pub fn parse_literal(raw: &str) -> Self {
        match raw {
            "true" => NarrativeValue::Bool(true),
            "false" => NarrativeValue::Bool(false),
            _ => match raw.parse::<f64>() {
                Ok(n) if n.is_finite() => NarrativeValue::Number(n),
                _ => NarrativeValue::Text(raw.to_string()),
            },
        }
    }

    /// Numeric view: booleans are 0/1, text must parse as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            NarrativeValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            NarrativeValue::Number(n) => Some(*n),
            NarrativeValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(NarrativeValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(NarrativeValue::Number),
            Value::String(s) => Some(NarrativeValue::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for NarrativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NarrativeValue::Bool(b) => write!(f, "{b}"),
            NarrativeValue::Number(n) => write!(f, "{n}"),
            NarrativeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for NarrativeValue {
    fn from(value: bool) -> Self {
        NarrativeValue::Bool(value)
    }
}

impl From<f64> for NarrativeValue {
    fn from(value: f64) -> Self {
        NarrativeValue::Number(value)
    }
}

impl From<&str> for NarrativeValue {
    fn from(value: &str) -> Self {
        NarrativeValue::Text(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueChoice {
    #[serde(alias = "Id")]
    pub id: String,
    #[serde(default, alias = "Text")]
    pub text: String,
    #[serde(alias = "NextDialogueId")]
    pub next_dialogue_id: String,
    /// e.g. `met_hero == true`
    #[serde(default, alias = "Condition", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// e.g. `set:met_hero=true`
    #[serde(default, alias = "Action", skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl DialogueChoice {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        next_dialogue_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            next_dialogue_id: next_dialogue_id.into(),
            condition: None,
            action: None,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

/// One line of dialogue. Presentation keys are passed through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueLine {
    #[serde(alias = "Id")]
    pub id: String,
    #[serde(default, alias = "Speaker")]
    pub speaker: String,
    #[serde(default, alias = "SpeakerDisplayName", skip_serializing_if = "Option::is_none")]
    pub speaker_display_name: Option<String>,
    #[serde(default, alias = "Text")]
    pub text: String,
    #[serde(default, alias = "Portrait", skip_serializing_if = "Option::is_none")]
    pub portrait: Option<String>,
    #[serde(default, alias = "Emotion", skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, alias = "NextId", skip_serializing_if = "Option::is_none")]
    pub next_id: Option<String>,
    #[serde(default, alias = "Choices", skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<DialogueChoice>,
    /// Seconds; interpreted by the caller.
    #[serde(default, alias = "AutoAdvanceTime", skip_serializing_if = "Option::is_none")]
    pub auto_advance_time: Option<f32>,
    #[serde(default, alias = "VoiceKey", skip_serializing_if = "Option::is_none")]
    pub voice_key: Option<String>,
    #[serde(default, alias = "BgmKey", skip_serializing_if = "Option::is_none")]
    pub bgm_key: Option<String>,
    #[serde(default, alias = "BackgroundKey", skip_serializing_if = "Option::is_none")]
    pub background_key: Option<String>,
}

impl DialogueLine {
    pub fn new(id: impl Into<String>, speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            speaker: speaker.into(),
            speaker_display_name: None,
            text: text.into(),
            portrait: None,
            emotion: None,
            next_id: None,
            choices: Vec::new(),
            auto_advance_time: None,
            voice_key: None,
            bgm_key: None,
            background_key: None,
        }
    }

    pub fn with_next(mut self, next_id: impl Into<String>) -> Self {
        self.next_id = Some(next_id.into());
        self
    }

    pub fn with_choices(mut self, choices: Vec<DialogueChoice>) -> Self {
        self.choices = choices;
        self
    }

    fn history_entry(&self) -> String {
        format!("{}: {}", self.speaker, self.text)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NarrativeData {
    pub dialogues: Vec<DialogueLine>,
    pub current_dialogue_id: Option<String>,
    pub variables: FxHashMap<String, NarrativeValue>,
    /// `"speaker: text"` backlog, oldest first.
    pub history: VecDeque<String>,
    pub max_history_length: usize,
    pub auto_mode: bool,
    pub skip_mode: bool,
}

impl Default for NarrativeData {
    fn default() -> Self {
        Self {
            dialogues: Vec::new(),
            current_dialogue_id: None,
            variables: FxHashMap::default(),
            history: VecDeque::new(),
            max_history_length: DEFAULT_MAX_HISTORY_LENGTH,
            auto_mode: false,
            skip_mode: false,
        }
    }
}

/// Narrative module. See the [module docs](self).
#[derive(Component, Debug, Clone)]
pub struct NarrativeModule {
    id: String,
    data: NarrativeData,
    /// Line id -> position in `data.dialogues`. Later duplicates win.
    index: FxHashMap<String, usize>,
    outbox: Outbox<DialogueEvent>,
}

impl NarrativeModule {
    pub const KIND: &'static str = "Narrative";

    pub fn new(id: impl Into<String>) -> Self {
        Self::with_data(id, NarrativeData::default())
    }

    pub fn with_data(id: impl Into<String>, data: NarrativeData) -> Self {
        let mut module = Self {
            id: id.into(),
            data,
            index: FxHashMap::default(),
            outbox: Outbox::default(),
        };
        module.trim_history();
        module.rebuild_index();
        module
    }

    pub fn data(&self) -> &NarrativeData {
        &self.data
    }

    // ===== Dialogue set =====

    pub fn set_dialogues(&mut self, dialogues: Vec<DialogueLine>) {
        self.data.dialogues = dialogues;
        self.rebuild_index();
    }

    pub fn add_dialogue(&mut self, line: DialogueLine) {
        self.index.insert(line.id.clone(), self.data.dialogues.len());
        self.data.dialogues.push(line);
    }

    pub fn dialogue(&self, id: &str) -> Option<&DialogueLine> {
        self.index.get(id).and_then(|&i| self.data.dialogues.get(i))
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .data
            .dialogues
            .iter()
            .enumerate()
            .map(|(i, line)| (line.id.clone(), i))
            .collect();
    }

    // ===== Flow =====

    /// The current line, or `None` when no dialogue is running.
    pub fn current_dialogue(&self) -> Option<&DialogueLine> {
        self.data
            .current_dialogue_id
            .as_deref()
            .and_then(|id| self.dialogue(id))
    }

    /// Choices of the current line whose condition holds right now.
    pub fn current_choices(&self) -> Vec<&DialogueChoice> {
        self.current_dialogue()
            .map(|line| {
                line.choices
                    .iter()
                    .filter(|c| self.condition_holds(c.condition.as_deref()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.current_dialogue().is_some()
    }

    pub fn history(&self) -> &VecDeque<String> {
        &self.data.history
    }

    /// Start at line `start_id`. An unknown id ends any running dialogue.
    pub fn start_dialogue(&mut self, start_id: &str) -> bool {
        let Some(&index) = self.index.get(start_id) else {
            warn!("Narrative '{}': dialogue '{}' not found", self.id, start_id);
            self.end_dialogue();
            return false;
        };
        self.enter(index);
        let line = self.data.dialogues[index].clone();
        self.outbox.push(DialogueEvent::Start {
            module_id: self.id.clone(),
            line,
        });
        true
    }

    /// Move past the current line.
    ///
    /// A line with choices is returned as is; otherwise `next_id` is
    /// followed, and without one the dialogue ends. A current id that no
    /// longer names a line (stale restored state) also ends the dialogue.
    pub fn advance(&mut self) -> Option<&DialogueLine> {
        let Some(current) = self.current_dialogue() else {
            if let Some(stale) = self.data.current_dialogue_id.clone() {
                warn!("Narrative '{}': dialogue '{}' not found", self.id, stale);
                self.end_dialogue();
            }
            return None;
        };
        if !current.choices.is_empty() {
            let id = current.id.clone();
            return self.dialogue(&id);
        }
        match current.next_id.clone() {
            Some(next) => self.go_to_dialogue(&next),
            None => {
                self.end_dialogue();
                None
            }
        }
    }

    /// Pick `choice_id` on the current line.
    ///
    /// Unknown choices and choices whose condition fails are rejected and
    /// leave the dialogue where it is.
    pub fn select_choice(&mut self, choice_id: &str) -> Option<&DialogueLine> {
        let choice = self
            .current_dialogue()?
            .choices
            .iter()
            .find(|c| c.id == choice_id)
            .cloned();
        let Some(choice) = choice else {
            warn!("Narrative '{}': choice '{}' not found", self.id, choice_id);
            return None;
        };

        if !self.condition_holds(choice.condition.as_deref()) {
            warn!(
                "Narrative '{}': condition not met for choice '{}': {}",
                self.id,
                choice.id,
                choice.condition.as_deref().unwrap_or_default()
            );
            return None;
        }

        if let Some(action) = choice.action.as_deref() {
            self.execute_action(action);
        }

        let next = choice.next_dialogue_id.clone();
        self.outbox.push(DialogueEvent::Choice {
            module_id: self.id.clone(),
            choice,
        });
        self.go_to_dialogue(&next)
    }

    /// Jump to `dialogue_id`. An unknown id ends the dialogue.
    pub fn go_to_dialogue(&mut self, dialogue_id: &str) -> Option<&DialogueLine> {
        let Some(&index) = self.index.get(dialogue_id) else {
            warn!("Narrative '{}': dialogue '{}' not found", self.id, dialogue_id);
            self.end_dialogue();
            return None;
        };
        self.enter(index);
        self.outbox.push(DialogueEvent::Advance {
            module_id: self.id.clone(),
            line: self.data.dialogues[index].clone(),
        });
        self.data.dialogues.get(index)
    }

    pub fn end_dialogue(&mut self) {
        self.data.current_dialogue_id = None;
        self.outbox.push(DialogueEvent::End {
            module_id: self.id.clone(),
        });
    }

    fn enter(&mut self, index: usize) {
        let line = &self.data.dialogues[index];
        self.data.current_dialogue_id = Some(line.id.clone());
        let entry = line.history_entry();
        self.data.history.push_back(entry);
        self.trim_history();
    }

    pub fn set_max_history_length(&mut self, max: usize) {
        self.data.max_history_length = max;
        self.trim_history();
    }

    fn trim_history(&mut self) {
        while self.data.history.len() > self.data.max_history_length {
            self.data.history.pop_front();
        }
    }

    // ===== Variables =====

    /// Variables restored from a serialized record are also found under
    /// their original spelling (`gold` finds `Gold`).
    pub fn get_variable(&self, key: &str) -> Option<&NarrativeValue> {
        self.data
            .variables
            .get(&record::stored_key(&self.data.variables, key))
    }

    /// Store `value`; an event is queued only if the value changed.
    pub fn set_variable(&mut self, key: &str, value: impl Into<NarrativeValue>) {
        let value = value.into();
        let key = record::stored_key(&self.data.variables, key);
        if self.data.variables.get(&key) == Some(&value) {
            return;
        }
        self.data.variables.insert(key.clone(), value.clone());
        self.outbox.push(DialogueEvent::VariableChanged {
            module_id: self.id.clone(),
            key,
            value,
        });
    }

    /// Evaluate a condition string against the current variables.
    pub fn evaluate_condition(&self, condition: &str) -> bool {
        let Some((key, operator, raw)) = parse_condition(condition) else {
            debug!("Narrative '{}': unparsed condition passes: {}", self.id, condition);
            return true;
        };
        let stored = self.get_variable(key);
        let expected = match NarrativeValue::parse_literal(raw) {
            NarrativeValue::Text(s) => NarrativeValue::Text(s.replace(['\'', '"'], "")),
            other => other,
        };

        let numbers = || Some((stored?.as_number()?, expected.as_number()?));
        match operator {
            "==" => stored == Some(&expected),
            "!=" => stored != Some(&expected),
            ">" => numbers().is_some_and(|(a, b)| a > b),
            "<" => numbers().is_some_and(|(a, b)| a < b),
            ">=" => numbers().is_some_and(|(a, b)| a >= b),
            "<=" => numbers().is_some_and(|(a, b)| a <= b),
            _ => true,
        }
    }

    fn condition_holds(&self, condition: Option<&str>) -> bool {
        condition.is_none_or(|c| self.evaluate_condition(c))
    }

    /// Run an action string such as `set:key=value` or `add:key=3`.
    pub fn execute_action(&mut self, action: &str) {
        let Some((command, assignment)) = action.split_once(':') else {
            return;
        };
        let Some((key, raw)) = assignment.split_once('=') else {
            return;
        };
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        let value = NarrativeValue::parse_literal(raw.trim());

        match command.trim() {
            "set" => self.set_variable(key, value),
            "add" => {
                let current = self
                    .get_variable(key)
                    .map_or(Some(0.0), NarrativeValue::as_number);
                match (current, value.as_number()) {
                    (Some(current), Some(delta)) => self.set_variable(key, current + delta),
                    _ => warn!("Narrative '{}': cannot add '{}' to '{}'", self.id, value, key),
                }
            }
            other => debug!("Narrative '{}': ignoring action '{}'", self.id, other),
        }
    }

    // ===== Modes =====

    pub fn toggle_auto_mode(&mut self) -> bool {
        self.data.auto_mode = !self.data.auto_mode;
        self.data.auto_mode
    }

    pub fn toggle_skip_mode(&mut self) -> bool {
        self.data.skip_mode = !self.data.skip_mode;
        self.data.skip_mode
    }

    pub fn auto_mode(&self) -> bool {
        self.data.auto_mode
    }

    pub fn skip_mode(&self) -> bool {
        self.data.skip_mode
    }

    /// Take every queued [`DialogueEvent`].
    pub fn drain_events(&mut self) -> Vec<DialogueEvent> {
        self.outbox.drain()
    }

    /// Build a module from a record in either key casing.
    ///
    /// The id is mandatory. Malformed dialogue lines are skipped with a
    /// warning; other missing fields take their defaults.
    pub fn deserialize(value: &Value) -> Result<Self, ModuleError> {
        let reader = RecordReader::new(value)
            .ok_or_else(|| ModuleError::NotARecord(Self::KIND.to_string()))?;
        let id = reader
            .str(&record::ID)
            .filter(|id| !id.is_empty())
            .ok_or(ModuleError::MissingId { kind: Self::KIND })?;

        let dialogues = reader
            .array(&DIALOGUES)
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(|line| match DialogueLine::deserialize(line) {
                        Ok(line) => Some(line),
                        Err(err) => {
                            warn!("Narrative '{id}': skipping malformed dialogue line: {err}");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        let variables = reader
            .object(&VARIABLES)
            .map(|vars| {
                vars.iter()
                    .filter_map(|(k, v)| NarrativeValue::from_json(v).map(|v| (k.clone(), v)))
                    .collect()
            })
            .unwrap_or_default();
        let history = reader
            .array(&HISTORY)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self::with_data(
            id,
            NarrativeData {
                dialogues,
                current_dialogue_id: reader.str(&CURRENT_DIALOGUE_ID).map(str::to_string),
                variables,
                history,
                max_history_length: reader
                    .u32(&MAX_HISTORY_LENGTH)
                    .map(|n| n as usize)
                    .unwrap_or(DEFAULT_MAX_HISTORY_LENGTH),
                auto_mode: reader.bool(&AUTO_MODE).unwrap_or(false),
                skip_mode: reader.bool(&SKIP_MODE).unwrap_or(false),
            },
        ))
    }
}

/// Split `key OP value`. `None` if the text is not a single comparison.
fn parse_condition(condition: &str) -> Option<(&str, &'static str, &str)> {
    let text = condition.trim();
    let key_end = text
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    if key_end == 0 {
        return None;
    }
    let (key, rest) = text.split_at(key_end);
    let rest = rest.trim_start();
    let operator = OPERATORS.into_iter().find(|op| rest.starts_with(op))?;
    let value = rest[operator.len()..].trim();
    if value.is_empty() {
        return None;
    }
    Some((key, operator, value))
}

impl Module for NarrativeModule {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn id(&self) -> &str {
        &self.id
    }

    /// Pacing (auto/skip) is left to the caller.
    fn update(&mut self, _dt: f32) {}

    fn serialize(&self) -> Value {
        let d = &self.data;
        pascal_keys(json!({
            "type": Self::KIND,
            "id": self.id,
            "dialogues": d.dialogues,
            "currentDialogueId": d.current_dialogue_id,
            "history": d.history,
            "maxHistoryLength": d.max_history_length,
            "autoMode": d.auto_mode,
            "skipMode": d.skip_mode,
            "variables": d.variables,
        }))
    }

    fn destroy(&mut self) {
        self.outbox.disconnect();
        self.index.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::record::camel_keys;

    fn story() -> NarrativeModule {
        let mut n = NarrativeModule::new("story");
        n.set_dialogues(vec![
            DialogueLine::new("intro", "Guide", "Welcome.").with_next("ask"),
            DialogueLine::new("ask", "Guide", "Will you help?").with_choices(vec![
                DialogueChoice::new("yes", "Sure", "thanks").with_action("set:helped=true"),
                DialogueChoice::new("rich", "For gold", "thanks").with_condition("gold >= 10"),
                DialogueChoice::new("lost", "Huh?", "nowhere"),
            ]),
            DialogueLine::new("thanks", "Guide", "Thank you!"),
        ]);
        n
    }

    fn event_names(n: &mut NarrativeModule) -> Vec<&'static str> {
        n.drain_events()
            .iter()
            .map(|e| match e {
                DialogueEvent::Start { .. } => "start",
                DialogueEvent::Advance { .. } => "advance",
                DialogueEvent::Choice { .. } => "choice",
                DialogueEvent::End { .. } => "end",
                DialogueEvent::VariableChanged { .. } => "variable",
            })
            .collect()
    }

    // ==================== FLOW TESTS ====================

    #[test]
    fn test_full_dialogue_flow() {
        let mut n = story();
        assert!(n.start_dialogue("intro"));
        assert!(n.is_active());
        assert_eq!(n.advance().map(|l| l.id.as_str()), Some("ask"));
        // choices block advancing
        assert_eq!(n.advance().map(|l| l.id.as_str()), Some("ask"));
        assert_eq!(n.select_choice("yes").map(|l| l.id.as_str()), Some("thanks"));
        assert_eq!(n.get_variable("helped"), Some(&NarrativeValue::Bool(true)));
        assert!(n.advance().is_none());
        assert!(!n.is_active());
        assert_eq!(
            event_names(&mut n),
            ["start", "advance", "variable", "choice", "advance", "end"]
        );
    }

    #[test]
    fn test_start_unknown_ends_gracefully() {
        let mut n = story();
        n.start_dialogue("intro");
        n.drain_events();
        assert!(!n.start_dialogue("missing"));
        assert!(!n.is_active());
        assert_eq!(event_names(&mut n), ["end"]);
    }

    #[test]
    fn test_choice_to_missing_line_ends() {
        let mut n = story();
        n.start_dialogue("ask");
        assert!(n.select_choice("lost").is_none());
        assert!(!n.is_active());
    }

    #[test]
    fn test_unknown_or_blocked_choice_is_rejected() {
        let mut n = story();
        n.start_dialogue("ask");
        n.drain_events();
        assert!(n.select_choice("nope").is_none());
        assert!(n.select_choice("rich").is_none());
        assert_eq!(n.current_dialogue().map(|l| l.id.as_str()), Some("ask"));
        assert!(n.drain_events().is_empty());

        n.set_variable("gold", 12.0);
        assert_eq!(n.select_choice("rich").map(|l| l.id.as_str()), Some("thanks"));
    }

    #[test]
    fn test_current_choices_filters_by_condition() {
        let mut n = story();
        n.start_dialogue("ask");
        let ids: Vec<&str> = n.current_choices().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["yes", "lost"]);
        n.set_variable("gold", 10.0);
        assert_eq!(n.current_choices().len(), 3);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut n = story();
        n.set_max_history_length(2);
        n.start_dialogue("intro");
        n.advance();
        n.select_choice("yes");
        let history: Vec<&str> = n.history().iter().map(String::as_str).collect();
        assert_eq!(history, ["Guide: Will you help?", "Guide: Thank you!"]);
    }

    #[test]
    fn test_add_dialogue_is_reachable() {
        let mut n = NarrativeModule::new("n");
        n.add_dialogue(DialogueLine::new("a", "A", "first").with_next("b"));
        n.add_dialogue(DialogueLine::new("b", "B", "second"));
        n.start_dialogue("a");
        assert_eq!(n.advance().map(|l| l.text.as_str()), Some("second"));
    }

    // ==================== VARIABLE TESTS ====================

    #[test]
    fn test_set_variable_emits_only_on_change() {
        let mut n = NarrativeModule::new("n");
        n.set_variable("flag", true);
        n.set_variable("flag", true);
        n.set_variable("flag", false);
        assert_eq!(event_names(&mut n), ["variable", "variable"]);
    }

    #[test]
    fn test_actions() {
        let mut n = NarrativeModule::new("n");
        n.execute_action("add:gold=5");
        n.execute_action("add:gold=2.5");
        assert_eq!(n.get_variable("gold"), Some(&NarrativeValue::Number(7.5)));
        n.execute_action("set:name=Ari");
        assert_eq!(n.get_variable("name"), Some(&NarrativeValue::from("Ari")));
        n.execute_action("dance:gold=1");
        n.execute_action("set:broken");
        assert_eq!(n.get_variable("gold"), Some(&NarrativeValue::Number(7.5)));
    }

    // ==================== CONDITION TESTS ====================

    #[test]
    fn test_condition_operators() {
        let mut n = NarrativeModule::new("n");
        n.set_variable("gold", 10.0);
        n.set_variable("met", true);
        n.set_variable("mood", "happy");

        assert!(n.evaluate_condition("gold > 5"));
        assert!(n.evaluate_condition("gold >= 10"));
        assert!(!n.evaluate_condition("gold < 10"));
        assert!(n.evaluate_condition("gold <= 10"));
        assert!(n.evaluate_condition("gold == 10"));
        assert!(n.evaluate_condition("met == true"));
        assert!(n.evaluate_condition("mood == \"happy\""));
        assert!(n.evaluate_condition("mood != 'sad'"));
    }

    #[test]
    fn test_condition_type_mismatch_is_false() {
        let mut n = NarrativeModule::new("n");
        n.set_variable("gold", 10.0);
        n.set_variable("mood", "happy");
        assert!(!n.evaluate_condition("gold == \"10\""));
        assert!(!n.evaluate_condition("mood > 3"));
        assert!(!n.evaluate_condition("missing >= 0"));
    }

    #[test]
    fn test_unparseable_condition_passes() {
        let n = NarrativeModule::new("n");
        assert!(n.evaluate_condition("just some words"));
        assert!(n.evaluate_condition("gold >"));
        assert!(n.evaluate_condition(""));
    }

    #[test]
    fn test_toggle_modes() {
        let mut n = NarrativeModule::new("n");
        assert!(n.toggle_auto_mode());
        assert!(!n.toggle_auto_mode());
        assert!(n.toggle_skip_mode());
        assert!(n.skip_mode());
    }

    // ==================== SERIALIZATION TESTS ====================

    #[test]
    fn test_round_trip() {
        let mut n = story();
        n.start_dialogue("intro");
        n.set_variable("playerName", "Ari");
        n.set_variable("gold", 3.0);
        n.toggle_auto_mode();

        let record = n.serialize();
        assert_eq!(record["Type"], "Narrative");
        assert_eq!(record["Dialogues"][1]["Choices"][0]["NextDialogueId"], "thanks");
        assert_eq!(record["Variables"]["PlayerName"], "Ari");
        assert!(record["Variables"].get("playerName").is_none());
        assert_eq!(record["CurrentDialogueId"], "intro");

        let back = NarrativeModule::deserialize(&record).unwrap();
        assert_eq!(back.id(), "story");
        assert_eq!(back.data().dialogues, n.data().dialogues);
        assert_eq!(back.data().history, n.data().history);
        assert_eq!(back.serialize(), record);
        assert_eq!(back.current_dialogue().map(|l| l.id.as_str()), Some("intro"));
        assert_eq!(back.get_variable("playerName"), n.get_variable("playerName"));
    }

    #[test]
    fn test_restored_variables_still_drive_conditions() {
        let mut n = story();
        n.set_variable("gold", 12.0);
        let mut back = NarrativeModule::deserialize(&n.serialize()).unwrap();
        assert!(back.evaluate_condition("gold >= 10"));

        back.execute_action("add:gold=3");
        assert_eq!(back.get_variable("gold"), Some(&NarrativeValue::Number(15.0)));
        assert_eq!(back.data().variables.len(), 1);

        back.start_dialogue("ask");
        let ids: Vec<&str> = back.current_choices().iter().map(|c| c.id.as_str()).collect();
        assert!(ids.contains(&"rich"));
    }

    #[test]
    fn test_round_trip_from_camel_keys() {
        let mut n = story();
        n.start_dialogue("intro");
        n.advance();
        n.set_variable("Visits", 2.0);
        n.toggle_skip_mode();

        let back = NarrativeModule::deserialize(&camel_keys(n.serialize())).unwrap();
        assert_eq!(back.id(), "story");
        assert_eq!(back.serialize(), n.serialize());
        assert_eq!(back.current_dialogue().map(|l| l.id.as_str()), Some("ask"));
        assert_eq!(back.current_choices().len(), 2);
    }

    #[test]
    fn test_advance_from_stale_restored_line_ends() {
        let mut n = NarrativeModule::deserialize(&json!({
            "id": "n",
            "dialogues": [{"id": "a", "speaker": "A", "text": "hi"}],
            "currentDialogueId": "gone",
        }))
        .unwrap();
        assert!(!n.is_active());
        assert!(n.advance().is_none());
        assert_eq!(n.data().current_dialogue_id, None);
        assert_eq!(event_names(&mut n), ["end"]);
        assert_eq!(n.serialize()["CurrentDialogueId"], Value::Null);

        // nothing running: no further end events
        assert!(n.advance().is_none());
        assert!(n.drain_events().is_empty());
    }

    #[test]
    fn test_deserialize_requires_id() {
        let err = NarrativeModule::deserialize(&json!({"dialogues": []})).unwrap_err();
        assert!(matches!(err, ModuleError::MissingId { kind: "Narrative" }));
        assert!(NarrativeModule::deserialize(&json!({"id": 7})).is_err());
    }

    #[test]
    fn test_deserialize_skips_malformed_lines() {
        let record = json!({
            "id": "n",
            "dialogues": [
                {"id": "a", "speaker": "A", "text": "hi"},
                {"speaker": "nobody"},
                "junk",
            ],
        });
        let n = NarrativeModule::deserialize(&record).unwrap();
        assert_eq!(n.data().dialogues.len(), 1);
        assert!(n.dialogue("a").is_some());
    }
}
