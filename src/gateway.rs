//! Typed request functions over the injected transport.
//!
//! One method per backend capability. Every method follows the same path:
//! build a payload, invoke the transport, normalize the raw reply through
//! [`Envelope::normalize`], turn `success=false` into
//! [`GatewayError::Backend`], and decode `data` into the typed model.
//! Callers never see a raw reply, and this layer never retries — retry
//! policy, if any, belongs to callers.
//!
//! Transport failures pass through unchanged as
//! [`GatewayError::Transport`]; they are a different failure class from a
//! backend-reported business failure.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use miette::Diagnostic;

use crate::envelope::Envelope;
use crate::model::{ChatMessage, Conversation, ExecutionOptions, NodeTypeDef, Workflow};
use crate::transport::{Transport, TransportError, ops};

/// Errors surfaced by gateway operations.
#[derive(Debug, Error, Diagnostic)]
pub enum GatewayError {
    /// The remote call itself failed; propagated verbatim.
    #[error(transparent)]
    #[diagnostic(code(flowdeck::gateway::transport))]
    Transport(#[from] TransportError),

    /// The backend replied with `success=false`.
    #[error("{message}")]
    #[diagnostic(code(flowdeck::gateway::backend))]
    Backend { message: String },

    /// The reply succeeded but its payload did not match the expected model.
    #[error("malformed payload in '{op}' reply: {source}")]
    #[diagnostic(
        code(flowdeck::gateway::decode),
        help("The backend and client disagree on the reply shape for this operation.")
    )]
    Decode {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The reply succeeded but carried no payload where one is required.
    #[error("reply for '{op}' carried no data")]
    #[diagnostic(code(flowdeck::gateway::missing_data))]
    MissingData { op: &'static str },
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Partial update for workflow metadata; absent fields are left untouched
/// server-side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update for a node's dual configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_config: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_config: Option<Map<String, Value>>,
}

/// Typed facade over the transport; the only component allowed to call it.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
}

impl Gateway {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Invoke one operation and normalize the reply, keeping the payload raw.
    async fn call(
        &self,
        op: &'static str,
        payload: Value,
        default_error: &str,
    ) -> Result<Option<Value>> {
        let request_id = Uuid::new_v4();
        tracing::debug!(%request_id, op, "dispatching remote operation");
        let raw = self.transport.invoke(op, payload).await?;
        let envelope = Envelope::normalize(raw, default_error);
        if !envelope.success {
            tracing::warn!(%request_id, op, message = %envelope.message, "backend reported failure");
            return Err(GatewayError::Backend {
                message: envelope.message,
            });
        }
        Ok(envelope.data)
    }

    /// Like [`Self::call`], but decode the payload into a typed model.
    async fn call_decoded<T: DeserializeOwned>(
        &self,
        op: &'static str,
        payload: Value,
        default_error: &str,
    ) -> Result<T> {
        let data = self
            .call(op, payload, default_error)
            .await?
            .ok_or(GatewayError::MissingData { op })?;
        serde_json::from_value(data).map_err(|source| GatewayError::Decode { op, source })
    }

    /// Like [`Self::call`], discarding any payload.
    async fn call_unit(&self, op: &'static str, payload: Value, default_error: &str) -> Result<()> {
        self.call(op, payload, default_error).await.map(|_| ())
    }

    // ----- workflow CRUD -----

    #[instrument(skip(self, description))]
    pub async fn create_workflow(&self, name: &str, description: &str) -> Result<Workflow> {
        self.call_decoded(
            ops::CREATE_WORKFLOW,
            json!({"name": name, "description": description}),
            "failed to create workflow",
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow> {
        self.call_decoded(
            ops::GET_WORKFLOW,
            json!({"workflow_id": workflow_id}),
            "failed to load workflow",
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        self.call_decoded(ops::LIST_WORKFLOWS, json!({}), "failed to list workflows")
            .await
    }

    #[instrument(skip(self, patch))]
    pub async fn update_workflow(&self, workflow_id: &str, patch: &WorkflowPatch) -> Result<()> {
        self.call_unit(
            ops::UPDATE_WORKFLOW,
            json!({"workflow_id": workflow_id, "patch": patch}),
            "failed to update workflow",
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_workflow(&self, workflow_id: &str) -> Result<()> {
        self.call_unit(
            ops::DELETE_WORKFLOW,
            json!({"workflow_id": workflow_id}),
            "failed to delete workflow",
        )
        .await
    }

    // ----- node CRUD / move -----

    /// Request a node insertion. The server assigns id and final index;
    /// callers must re-fetch the workflow to learn them.
    #[instrument(skip(self, flow_config, work_config))]
    pub async fn add_node(
        &self,
        workflow_id: &str,
        node_type: &str,
        flow_config: Map<String, Value>,
        work_config: Map<String, Value>,
        index: Option<usize>,
    ) -> Result<()> {
        self.call_unit(
            ops::ADD_NODE,
            json!({
                "workflow_id": workflow_id,
                "node_type": node_type,
                "flow_config": flow_config,
                "work_config": work_config,
                "index": index,
            }),
            "failed to add node",
        )
        .await
    }

    #[instrument(skip(self, patch))]
    pub async fn update_node(&self, node_id: &str, patch: &NodePatch) -> Result<()> {
        self.call_unit(
            ops::UPDATE_NODE,
            json!({"node_id": node_id, "patch": patch}),
            "failed to update node",
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_node(&self, node_id: &str) -> Result<()> {
        self.call_unit(
            ops::DELETE_NODE,
            json!({"node_id": node_id}),
            "failed to delete node",
        )
        .await
    }

    /// Request a reposition. Renumbering the remaining nodes is solely the
    /// server's responsibility.
    #[instrument(skip(self))]
    pub async fn move_node(&self, node_id: &str, new_index: usize) -> Result<()> {
        self.call_unit(
            ops::MOVE_NODE,
            json!({"node_id": node_id, "new_index": new_index}),
            "failed to move node",
        )
        .await
    }

    // ----- type registry & defaults -----

    #[instrument(skip(self))]
    pub async fn list_node_types(&self) -> Result<Vec<NodeTypeDef>> {
        self.call_decoded(
            ops::LIST_NODE_TYPES,
            json!({}),
            "failed to load node types",
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn default_flow_config(&self, node_type: &str) -> Result<Map<String, Value>> {
        self.call_decoded(
            ops::DEFAULT_FLOW_CONFIG,
            json!({"node_type": node_type}),
            "failed to load default flow config",
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn default_work_config(&self, node_type: &str) -> Result<Map<String, Value>> {
        self.call_decoded(
            ops::DEFAULT_WORK_CONFIG,
            json!({"node_type": node_type}),
            "failed to load default work config",
        )
        .await
    }

    // ----- execution -----

    /// Bare execution: no conversation recording. Resolves with the raw
    /// result payload (JSON `null` when the backend sent none).
    #[instrument(skip(self, input, options))]
    pub async fn execute(
        &self,
        workflow_id: &str,
        input: &str,
        options: &ExecutionOptions,
    ) -> Result<Value> {
        let data = self
            .call(
                ops::EXECUTE_WORKFLOW,
                json!({"workflow_id": workflow_id, "input": input, "options": options}),
                "workflow execution failed",
            )
            .await?;
        Ok(data.unwrap_or(Value::Null))
    }

    /// Conversation-recorded execution. The reply payload may carry a
    /// server-assigned `conversation_id` differing from the requested one;
    /// extraction is the caller's concern since the shape is backend-owned.
    #[instrument(skip(self, input, options))]
    pub async fn execute_recorded(
        &self,
        workflow_id: &str,
        conversation_id: &str,
        input: &str,
        options: &ExecutionOptions,
    ) -> Result<Value> {
        let data = self
            .call(
                ops::EXECUTE_WORKFLOW_RECORDED,
                json!({
                    "workflow_id": workflow_id,
                    "conversation_id": conversation_id,
                    "input": input,
                    "options": options,
                }),
                "workflow execution failed",
            )
            .await?;
        Ok(data.unwrap_or(Value::Null))
    }

    // ----- conversation CRUD -----

    #[instrument(skip(self))]
    pub async fn create_conversation(&self, workflow_id: &str) -> Result<Conversation> {
        self.call_decoded(
            ops::CREATE_CONVERSATION,
            json!({"workflow_id": workflow_id}),
            "failed to create conversation",
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_conversations(&self, workflow_id: &str) -> Result<Vec<Conversation>> {
        self.call_decoded(
            ops::LIST_CONVERSATIONS,
            json!({"workflow_id": workflow_id}),
            "failed to list conversations",
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        self.call_unit(
            ops::DELETE_CONVERSATION,
            json!({"conversation_id": conversation_id}),
            "failed to delete conversation",
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        self.call_decoded(
            ops::LIST_MESSAGES,
            json!({"conversation_id": conversation_id}),
            "failed to load messages",
        )
        .await
    }
}
