//! In-memory ownership of the open workflow and its node list.
//!
//! `GraphStore` holds at most one open workflow at a time and exposes the
//! CRUD/reorder operations of the graph model. Every mutation is
//! fire-and-refetch: the store dispatches the mutation, then re-fetches the
//! workflow so the server-assigned ordering and ids become the local truth.
//! The store never renumbers indices, never merges configs client-side, and
//! applies no partial local mutation — if a call fails at any point, the
//! previously held workflow is untouched.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::instrument;

use crate::gateway::{Gateway, GatewayError, NodePatch, WorkflowPatch};
use crate::model::{NodeTypeDef, Workflow};

/// Errors surfaced by graph store operations.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error(transparent)]
    #[diagnostic(code(flowdeck::store::gateway))]
    Gateway(#[from] GatewayError),

    /// A node-level operation was attempted with no workflow open.
    #[error("no workflow is open")]
    #[diagnostic(
        code(flowdeck::store::no_open_workflow),
        help("Call open_workflow or create_workflow first.")
    )]
    NoOpenWorkflow,

    /// Required-name validation blocks the call before dispatch.
    #[error("workflow name must not be empty")]
    #[diagnostic(code(flowdeck::store::empty_name))]
    EmptyName,

    /// The requested type is absent from the backend's type registry.
    #[error("unknown node type: {0}")]
    #[diagnostic(code(flowdeck::store::unknown_node_type))]
    UnknownNodeType(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Owner of the currently open workflow and the node-type registry.
pub struct GraphStore {
    gateway: Arc<Gateway>,
    workflow: Option<Workflow>,
    node_types: FxHashMap<String, NodeTypeDef>,
}

impl GraphStore {
    #[must_use]
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            workflow: None,
            node_types: FxHashMap::default(),
        }
    }

    /// The currently open workflow, if any.
    #[must_use]
    pub fn workflow(&self) -> Option<&Workflow> {
        self.workflow.as_ref()
    }

    /// Definition for one node type, once the registry is loaded.
    #[must_use]
    pub fn node_type(&self, name: &str) -> Option<&NodeTypeDef> {
        self.node_types.get(name)
    }

    /// Drop the open workflow without touching the backend.
    pub fn close(&mut self) {
        self.workflow = None;
    }

    fn open_id(&self) -> Result<String> {
        self.workflow
            .as_ref()
            .map(|w| w.id.clone())
            .ok_or(StoreError::NoOpenWorkflow)
    }

    /// Re-fetch the open workflow and replace local state with the reply.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> Result<&Workflow> {
        let id = self.open_id()?;
        let fresh = self.gateway.get_workflow(&id).await?;
        Ok(self.workflow.insert(fresh))
    }

    // ----- workflow lifecycle -----

    /// Create a workflow on the backend and open the canonical object it
    /// returns.
    #[instrument(skip(self, description))]
    pub async fn create_workflow(&mut self, name: &str, description: &str) -> Result<&Workflow> {
        if name.trim().is_empty() {
            return Err(StoreError::EmptyName);
        }
        let created = self.gateway.create_workflow(name, description).await?;
        Ok(self.workflow.insert(created))
    }

    #[instrument(skip(self))]
    pub async fn open_workflow(&mut self, workflow_id: &str) -> Result<&Workflow> {
        let fetched = self.gateway.get_workflow(workflow_id).await?;
        Ok(self.workflow.insert(fetched))
    }

    pub async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        Ok(self.gateway.list_workflows().await?)
    }

    /// Patch metadata of the open workflow, then re-fetch it.
    #[instrument(skip(self, patch))]
    pub async fn update_workflow(&mut self, patch: WorkflowPatch) -> Result<&Workflow> {
        if let Some(name) = &patch.name
            && name.trim().is_empty()
        {
            return Err(StoreError::EmptyName);
        }
        let id = self.open_id()?;
        self.gateway.update_workflow(&id, &patch).await?;
        self.refresh().await
    }

    /// Delete a workflow; closes it locally when it was the open one.
    #[instrument(skip(self))]
    pub async fn delete_workflow(&mut self, workflow_id: &str) -> Result<()> {
        self.gateway.delete_workflow(workflow_id).await?;
        if self.workflow.as_ref().is_some_and(|w| w.id == workflow_id) {
            self.workflow = None;
        }
        Ok(())
    }

    // ----- node operations (all fire-and-refetch) -----

    /// Insert a node of `node_type`, seeded from the backend's per-type
    /// default configs with the caller's overrides layered on top. The
    /// server assigns id and index; local state is replaced by a re-fetch.
    #[instrument(skip(self, flow_overrides, work_overrides))]
    pub async fn add_node(
        &mut self,
        node_type: &str,
        flow_overrides: Option<Map<String, Value>>,
        work_overrides: Option<Map<String, Value>>,
        index: Option<usize>,
    ) -> Result<&Workflow> {
        let id = self.open_id()?;
        if self.node_types.is_empty() {
            self.load_node_types().await?;
        }
        if !self.node_types.contains_key(node_type) {
            return Err(StoreError::UnknownNodeType(node_type.to_string()));
        }

        let flow_defaults = self.gateway.default_flow_config(node_type).await?;
        let work_defaults = self.gateway.default_work_config(node_type).await?;
        let flow_config = overlay(flow_defaults, flow_overrides);
        let work_config = overlay(work_defaults, work_overrides);

        self.gateway
            .add_node(&id, node_type, flow_config, work_config, index)
            .await?;
        self.refresh().await
    }

    /// Partial config update; absent fields stay untouched server-side.
    #[instrument(skip(self, patch))]
    pub async fn update_node(&mut self, node_id: &str, patch: NodePatch) -> Result<&Workflow> {
        self.open_id()?;
        self.gateway.update_node(node_id, &patch).await?;
        self.refresh().await
    }

    #[instrument(skip(self))]
    pub async fn delete_node(&mut self, node_id: &str) -> Result<&Workflow> {
        self.open_id()?;
        self.gateway.delete_node(node_id).await?;
        self.refresh().await
    }

    /// Request a reposition; the server renumbers, the re-fetch reveals the
    /// resulting order.
    #[instrument(skip(self))]
    pub async fn move_node(&mut self, node_id: &str, new_index: usize) -> Result<&Workflow> {
        self.open_id()?;
        self.gateway.move_node(node_id, new_index).await?;
        self.refresh().await
    }

    // ----- type registry -----

    /// Load (or reload) the node-type registry from the backend.
    #[instrument(skip(self))]
    pub async fn load_node_types(&mut self) -> Result<&FxHashMap<String, NodeTypeDef>> {
        let defs = self.gateway.list_node_types().await?;
        self.node_types = defs.into_iter().map(|d| (d.name.clone(), d)).collect();
        Ok(&self.node_types)
    }
}

/// Shallow overlay of caller overrides onto backend defaults.
fn overlay(base: Map<String, Value>, overrides: Option<Map<String, Value>>) -> Map<String, Value> {
    let mut merged = base;
    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            merged.insert(key, value);
        }
    }
    merged
}
