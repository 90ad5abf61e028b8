//! The injected transport boundary to the backend process.
//!
//! Everything remote goes through a single asynchronous primitive:
//! `invoke(operation, payload)`. The host environment supplies the
//! implementation (an IPC bridge, a channel to a sidecar process, a test
//! double); this crate only defines the contract and the operation
//! identifiers. [`crate::gateway::Gateway`] is the only component that calls
//! it.
//!
//! Transport failures (disconnection, host-level timeout) are a distinct
//! failure class from business failures reported inside a reply envelope;
//! they surface as [`TransportError`] and are propagated verbatim.

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

/// Operation identifiers understood by the backend, one per capability.
pub mod ops {
    pub const CREATE_WORKFLOW: &str = "create_workflow";
    pub const GET_WORKFLOW: &str = "get_workflow";
    pub const LIST_WORKFLOWS: &str = "list_workflows";
    pub const UPDATE_WORKFLOW: &str = "update_workflow";
    pub const DELETE_WORKFLOW: &str = "delete_workflow";

    pub const ADD_NODE: &str = "add_node";
    pub const UPDATE_NODE: &str = "update_node";
    pub const DELETE_NODE: &str = "delete_node";
    pub const MOVE_NODE: &str = "move_node";

    pub const LIST_NODE_TYPES: &str = "list_node_types";
    pub const DEFAULT_FLOW_CONFIG: &str = "default_flow_config";
    pub const DEFAULT_WORK_CONFIG: &str = "default_work_config";

    pub const EXECUTE_WORKFLOW: &str = "execute_workflow";
    pub const EXECUTE_WORKFLOW_RECORDED: &str = "execute_workflow_recorded";

    pub const CREATE_CONVERSATION: &str = "create_conversation";
    pub const LIST_CONVERSATIONS: &str = "list_conversations";
    pub const DELETE_CONVERSATION: &str = "delete_conversation";
    pub const LIST_MESSAGES: &str = "list_messages";
}

/// Asynchronous request/response primitive supplied by the host.
///
/// Implementations must not interpret replies; raw values are normalized
/// downstream by [`crate::envelope::Envelope::normalize`]. Serialization and
/// framing are entirely the implementation's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatch one operation and resolve with the backend's raw reply.
    async fn invoke(&self, op: &str, payload: Value) -> Result<Value, TransportError>;
}

/// Failure of the remote call itself, before any reply exists.
#[derive(Debug, Error, Diagnostic)]
pub enum TransportError {
    /// The host-side connection to the backend is gone.
    #[error("transport disconnected: {0}")]
    #[diagnostic(
        code(flowdeck::transport::disconnected),
        help("Check that the backend process is running and the bridge is attached.")
    )]
    Disconnected(String),

    /// The host gave up waiting for the backend.
    #[error("transport timed out after {ms} ms")]
    #[diagnostic(code(flowdeck::transport::timeout))]
    Timeout { ms: u64 },

    /// The host reported an error while dispatching the operation.
    #[error("host error during '{op}': {message}")]
    #[diagnostic(code(flowdeck::transport::host))]
    Host { op: String, message: String },
}
