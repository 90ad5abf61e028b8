//! Typed entities exchanged with the backend.
//!
//! These are wire-facing models: every struct deserializes defensively
//! (`#[serde(default)]` on anything the backend has historically omitted)
//! and carries configuration as plain JSON objects, since a node's work
//! config is an arbitrary shape keyed by its type.
//!
//! The client never fabricates identity or ordering for server-owned
//! entities: workflow and node ids, node indices, and conversation ids are
//! all assigned by the backend and re-fetched after every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A workflow: an ordered node list plus metadata.
///
/// Invariant (server-enforced, client-verified): node indices are dense and
/// contiguous, exactly `0..nodes.len()`, after any successful mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nodes: Vec<NodeRef>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Workflow {
    /// Look up a node by its server-assigned id.
    #[must_use]
    pub fn node(&self, node_id: &str) -> Option<&NodeRef> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// True when node indices are exactly `{0, …, N−1}` in list order.
    #[must_use]
    pub fn indices_dense(&self) -> bool {
        self.nodes.iter().enumerate().all(|(i, n)| n.index == i)
    }
}

/// One node of a workflow, with its dual configuration.
///
/// `flow_config` holds structural/presentation settings (display name,
/// status, layout hints); `work_config` holds the runtime parameters the
/// node consumes during execution, an arbitrary shape keyed by `node_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: String,
    pub node_type: String,
    /// 0-based position within the workflow, assigned by the server.
    pub index: usize,
    #[serde(default)]
    pub flow_config: Map<String, Value>,
    #[serde(default)]
    pub work_config: Map<String, Value>,
}

/// A node type definition from the backend's type registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTypeDef {
    /// Registry key, e.g. `"Chat"`. Matches [`NodeRef::node_type`].
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub capabilities: Vec<NodeCapability>,
}

impl NodeTypeDef {
    #[must_use]
    pub fn has_capability(&self, capability: NodeCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Capability tags attached to node type definitions.
///
/// Editors key their behavioral overrides on capabilities rather than on
/// type-name strings, which would be brittle against registry renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCapability {
    /// The node keeps multi-turn conversational state and accepts a
    /// conversation reference in its flow config.
    StatefulMemory,
    /// The node can stream incremental output during execution.
    Streaming,
}

/// Role of a chat message sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    System,
    /// Synthetic client-side role for failure notices in a transcript.
    Error,
    /// Synthetic client-side role for an in-progress placeholder.
    Loading,
}

impl ChatRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Error => "error",
            Self::Loading => "loading",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in a conversation transcript.
///
/// The role is kept as a plain string so unknown roles from the backend
/// round-trip untouched; use [`ChatRole`] and [`ChatMessage::is_role`] for
/// standardized values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a message with the given role and content, stamped now.
    #[must_use]
    pub fn with_role(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role: role.as_str().to_string(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(ChatRole::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(ChatRole::Assistant, content)
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(ChatRole::System, content)
    }

    #[must_use]
    pub fn is_role(&self, role: ChatRole) -> bool {
        self.role == role.as_str()
    }
}

/// A server-tracked conversation scoped to one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub workflow_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Per-workflow execution settings, persisted client-side.
///
/// Sent to the backend only as the options payload of an execution call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    pub debug: bool,
    /// Forwarded to the backend; the client enforces no local timeout.
    pub timeout_ms: u64,
    pub validate_start_end: bool,
    pub record_conversation: bool,
    pub record_node_execution: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            debug: false,
            timeout_ms: 120_000,
            validate_start_end: true,
            record_conversation: true,
            record_node_execution: false,
        }
    }
}

/// Result of a dispatched execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    /// The backend's raw result payload, unmodified.
    pub result: Value,
    /// The conversation the run was recorded under, when recording was on.
    /// Reflects a server-assigned id when the backend adopted a new one.
    pub conversation_id: Option<String>,
}
