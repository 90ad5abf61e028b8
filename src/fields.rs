//! Editable field schemas derived from a configuration object's runtime
//! shape.
//!
//! A node's config is an arbitrary JSON object, so the editor schema cannot
//! be static: each field's kind is inferred from the value it currently
//! holds (string, number, boolean, array, object), with two named overrides
//! layered on top — a multi-line editor for the system-prompt key, and a
//! conversation-reference editor for memory-capable node types. Overrides
//! key on field name plus capability tag, never on type-name strings.
//!
//! Edits are pure: [`apply_edit`] returns a new config object and never
//! mutates in place; persisting the result through
//! [`crate::store::GraphStore::update_node`] is the caller's job.
//! Malformed JSON typed into an array/object field is rejected with the
//! prior value preserved, and the rejection is surfaced as
//! [`EditOutcome::Rejected`] so consumers can choose whether to display it.

use serde_json::{Map, Value};

use crate::model::{NodeCapability, NodeTypeDef};

/// Flow-config key holding a node's system prompt; rendered multi-line.
pub const SYSTEM_PROMPT_KEY: &str = "system_prompt";

/// Flow-config key referencing the conversation a memory-capable node
/// reads history from.
pub const CONVERSATION_REF_KEY: &str = "conversation_id";

/// Sibling key of [`CONVERSATION_REF_KEY`] bounding how many history
/// rounds the node consumes.
pub const HISTORY_ROUNDS_KEY: &str = "history_rounds";

/// Which of a node's two config objects a field writes back into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigTarget {
    Flow,
    Work,
}

/// Editor kind for one config field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single-line text editor.
    Text,
    /// Multi-line text editor (system prompt).
    LongText,
    /// Numeric editor with `parseFloat`-style leniency, no implicit
    /// rounding.
    Number,
    /// Boolean toggle.
    Toggle,
    /// Textual JSON editor that must parse back to an array.
    ArrayJson,
    /// Textual JSON editor that must parse back to an object.
    ObjectJson,
    /// Conversation-reference editor: session picker plus free-text id,
    /// paired with an independent history-rounds control.
    SessionRef,
}

/// A transient, derived view of one editable config entry.
///
/// Recomputed from the current node on every render; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigField {
    pub key: String,
    pub kind: FieldKind,
    pub value: Value,
    pub target: ConfigTarget,
}

/// Result of applying one edit to a config object.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// The edit parsed; here is the new config object.
    Applied(Map<String, Value>),
    /// The input did not fit the field's kind; the prior config stands.
    Rejected { key: String, reason: String },
}

/// Derive the editable field list from a config object's runtime shape.
///
/// `type_def` enables capability-keyed overrides; pass `None` when the
/// node's type is not (yet) known and only generic kinds apply.
#[must_use]
pub fn derive_fields(
    config: &Map<String, Value>,
    target: ConfigTarget,
    type_def: Option<&NodeTypeDef>,
) -> Vec<ConfigField> {
    config
        .iter()
        .map(|(key, value)| ConfigField {
            key: key.clone(),
            kind: infer_kind(key, value, target, type_def),
            value: value.clone(),
            target,
        })
        .collect()
}

fn infer_kind(
    key: &str,
    value: &Value,
    target: ConfigTarget,
    type_def: Option<&NodeTypeDef>,
) -> FieldKind {
    let memory_capable =
        type_def.is_some_and(|def| def.has_capability(NodeCapability::StatefulMemory));
    if target == ConfigTarget::Flow && key == CONVERSATION_REF_KEY && memory_capable {
        return FieldKind::SessionRef;
    }
    match value {
        Value::String(_) if key == SYSTEM_PROMPT_KEY => FieldKind::LongText,
        // Null is editable as free text; anything typed replaces it.
        Value::String(_) | Value::Null => FieldKind::Text,
        Value::Number(_) => FieldKind::Number,
        Value::Bool(_) => FieldKind::Toggle,
        Value::Array(_) => FieldKind::ArrayJson,
        Value::Object(_) => FieldKind::ObjectJson,
    }
}

/// Apply one textual edit, producing a new config object.
///
/// Only `field.key` is ever touched; sibling keys (notably
/// [`HISTORY_ROUNDS_KEY`] next to a [`FieldKind::SessionRef`] field) are
/// preserved verbatim.
#[must_use]
pub fn apply_edit(config: &Map<String, Value>, field: &ConfigField, input: &str) -> EditOutcome {
    let parsed = match field.kind {
        FieldKind::Text | FieldKind::LongText | FieldKind::SessionRef => {
            Ok(Value::String(input.to_string()))
        }
        FieldKind::Number => parse_number(input),
        FieldKind::Toggle => parse_toggle(input),
        FieldKind::ArrayJson => parse_structured(input, Value::is_array, "a JSON array"),
        FieldKind::ObjectJson => parse_structured(input, Value::is_object, "a JSON object"),
    };
    match parsed {
        Ok(value) => {
            let mut next = config.clone();
            next.insert(field.key.clone(), value);
            EditOutcome::Applied(next)
        }
        Err(reason) => EditOutcome::Rejected {
            key: field.key.clone(),
            reason,
        },
    }
}

/// Write the history-rounds sibling key without disturbing anything else.
#[must_use]
pub fn apply_history_rounds(config: &Map<String, Value>, rounds: u32) -> Map<String, Value> {
    let mut next = config.clone();
    next.insert(HISTORY_ROUNDS_KEY.to_string(), Value::from(rounds));
    next
}

/// `parseFloat`-style parse: leading whitespace skipped, the longest valid
/// numeric prefix wins, anything after it is ignored. No numeric prefix at
/// all is a rejection (JSON has no NaN to store).
fn parse_number(input: &str) -> Result<Value, String> {
    let trimmed = input.trim_start();
    let mut end = 0;
    let bytes = trimmed.as_bytes();
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return Err("not a number".to_string());
    }
    // Optional exponent; claimed only when at least one digit follows it,
    // otherwise a trailing "e" is trailing garbage like any other.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }
    let text = &trimmed[..end];
    let value: f64 = text
        .parse()
        .map_err(|_| format!("invalid numeric input: {text}"))?;
    // Keep integer-shaped values integer so int configs stay ints.
    if value.fract() == 0.0 && value.abs() <= i64::MAX as f64 && !seen_dot {
        Ok(Value::from(value as i64))
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .ok_or_else(|| "non-finite number".to_string())
    }
}

fn parse_toggle(input: &str) -> Result<Value, String> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        other => Err(format!("expected true or false, got '{other}'")),
    }
}

fn parse_structured(
    input: &str,
    check: impl Fn(&Value) -> bool,
    expected: &str,
) -> Result<Value, String> {
    let value: Value =
        serde_json::from_str(input).map_err(|e| format!("invalid JSON: {e}"))?;
    if check(&value) {
        Ok(value)
    } else {
        Err(format!("expected {expected}"))
    }
}
