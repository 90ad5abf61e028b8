//! # Flowdeck: client-side workflow orchestration
//!
//! Flowdeck is the orchestration layer of a visual workflow builder: it
//! owns the ordered node list of the open workflow, the two-tier
//! configuration of each node, and the conversational execution sessions a
//! workflow runs under. Node execution, persistence, and business logic
//! live in a separate backend process reached only through an injected
//! [`transport::Transport`].
//!
//! ## Core concepts
//!
//! - **Envelope**: every backend reply, whatever its shape, is normalized
//!   into the canonical `{success, message, data}` form before use
//! - **Gateway**: typed request functions, one per backend capability
//! - **GraphStore**: fire-and-refetch ownership of the open workflow's
//!   node list — the server response is the single source of truth after
//!   every write
//! - **Config fields**: editor schemas derived from a config object's
//!   runtime shape, with capability-keyed overrides
//! - **SessionManager**: conversation lifecycle plus optimistic-then-
//!   authoritative execution dispatch, race-guarded by request sequencing
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flowdeck::{Gateway, GraphStore, SessionManager, ExecutionOptions};
//! # async fn example(transport: Arc<dyn flowdeck::Transport>) -> miette::Result<()> {
//!
//! let gateway = Arc::new(Gateway::new(transport));
//! let mut store = GraphStore::new(gateway.clone());
//!
//! let workflow = store.create_workflow("Support bot", "Answers tickets").await?;
//! let workflow_id = workflow.id.clone();
//! store.add_node("Start", None, None, None).await?;
//! store.add_node("Chat", None, None, None).await?;
//!
//! let sessions = SessionManager::new(gateway, workflow_id);
//! let outcome = sessions.execute("Hello!", &ExecutionOptions::default()).await?;
//! println!("{}", outcome.result);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module guide
//!
//! - [`envelope`] - Reply normalization into the canonical envelope
//! - [`transport`] - The injected request/response boundary
//! - [`model`] - Typed entities (workflows, nodes, conversations, options)
//! - [`gateway`] - Typed remote operations over the transport
//! - [`store`] - The open workflow and its node list
//! - [`fields`] - Shape-derived config field schemas and edits
//! - [`session`] - Conversation state machine and execution dispatch
//! - [`options_store`] - Durable per-workflow client settings
//! - [`telemetry`] - Default tracing subscriber setup

pub mod envelope;
pub mod fields;
pub mod gateway;
pub mod model;
pub mod options_store;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod transport;

pub use envelope::Envelope;
pub use fields::{
    ConfigField, ConfigTarget, EditOutcome, FieldKind, apply_edit, apply_history_rounds,
    derive_fields,
};
pub use gateway::{Gateway, GatewayError, NodePatch, WorkflowPatch};
pub use model::{
    ChatMessage, ChatRole, Conversation, ExecutionOptions, ExecutionOutcome, NodeCapability,
    NodeRef, NodeTypeDef, Workflow,
};
#[cfg(feature = "sqlite")]
pub use options_store::SqliteOptionsStore;
pub use options_store::{InMemoryOptionsStore, OptionsStore, OptionsStoreError, WorkspaceOptions};
pub use session::{SessionError, SessionManager, SessionPhase, WELCOME_MESSAGE};
pub use store::{GraphStore, StoreError};
pub use transport::{Transport, TransportError, ops};
