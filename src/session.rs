//! Conversation-scoped execution sessions.
//!
//! `SessionManager` owns everything conversational for one open workflow:
//! the known conversation list, the active-conversation pointer, the
//! message transcript, and the dispatch of execution requests in their two
//! modes (bare and conversation-recorded).
//!
//! # Optimistic-then-authoritative
//!
//! A recorded execution appends the user's input to the transcript before
//! the network call resolves, so the UI reflects intent immediately. After
//! the call resolves the full history is reloaded from the backend and the
//! optimistic message is superseded by the authoritative transcript — never
//! merged with it. On failure the optimistic message stays visible and
//! unreconciled; it is intentionally not rolled back.
//!
//! # Request sequencing
//!
//! Methods take `&self` and never hold the state lock across an await, so
//! callers may share the manager and overlap operations. Every operation
//! records a monotonic sequence token at start; any state write that
//! happens after an await is applied only while no newer operation has
//! begun. A history reload racing a conversation switch is therefore
//! discarded instead of overwriting the just-switched view.
//!
//! # No true cancellation
//!
//! [`SessionManager::dismiss`] only clears the local in-progress flag; it
//! does not abort the in-flight call, whose reconciliation may still apply
//! afterwards unless a newer operation started in between.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::gateway::{Gateway, GatewayError};
use crate::model::{ChatMessage, Conversation, ExecutionOptions, ExecutionOutcome};

/// Content of the synthetic system message shown whenever no conversation
/// is active.
pub const WELCOME_MESSAGE: &str =
    "Hello! Configure your workflow, then send a message to try it out.";

/// Whether a conversation is currently active for the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No conversation is active; the transcript shows the welcome message.
    NoSession,
    /// A conversation is active and owns the transcript.
    Active,
}

/// Errors surfaced by session operations.
#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error(transparent)]
    #[diagnostic(code(flowdeck::session::gateway))]
    Gateway(#[from] GatewayError),

    /// The referenced conversation is not in the known list.
    #[error("unknown conversation: {0}")]
    #[diagnostic(code(flowdeck::session::unknown_conversation))]
    UnknownConversation(String),

    /// Required-input validation blocks the call before dispatch.
    #[error("execution input must not be empty")]
    #[diagnostic(code(flowdeck::session::empty_input))]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, SessionError>;

struct SessionInner {
    conversations: Vec<Conversation>,
    active: Option<String>,
    messages: Vec<ChatMessage>,
    /// Token of the execution that raised the in-progress indicator, if
    /// one is in flight. Only its owner (or a superseding operation, or
    /// `dismiss`) may lower it.
    pending: Option<u64>,
    /// Monotonic request sequence; state writes after an await compare
    /// their captured token against this before applying.
    seq: u64,
}

/// Conversation state machine for one open workflow.
pub struct SessionManager {
    gateway: Arc<Gateway>,
    workflow_id: String,
    inner: Mutex<SessionInner>,
}

impl SessionManager {
    /// A fresh manager in the `NoSession` phase with the welcome transcript.
    #[must_use]
    pub fn new(gateway: Arc<Gateway>, workflow_id: impl Into<String>) -> Self {
        Self {
            gateway,
            workflow_id: workflow_id.into(),
            inner: Mutex::new(SessionInner {
                conversations: Vec::new(),
                active: None,
                messages: vec![welcome()],
                pending: None,
                seq: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new operation: bump the sequence and return its token.
    fn begin(&self) -> u64 {
        let mut inner = self.lock();
        inner.seq += 1;
        inner.seq
    }

    /// Start an execution: like [`Self::begin`] but raises the pending
    /// flag under the new token's ownership.
    fn begin_pending(&self) -> u64 {
        let mut inner = self.lock();
        inner.seq += 1;
        inner.pending = Some(inner.seq);
        inner.seq
    }

    /// Lower the pending flag if `token` still owns it. A flag raised by a
    /// newer execution stays up.
    fn settle(&self, token: u64) {
        let mut inner = self.lock();
        if inner.pending == Some(token) {
            inner.pending = None;
        }
    }

    // ----- read-only snapshots -----

    #[must_use]
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.lock().active.is_some() {
            SessionPhase::Active
        } else {
            SessionPhase::NoSession
        }
    }

    #[must_use]
    pub fn active_conversation(&self) -> Option<String> {
        self.lock().active.clone()
    }

    #[must_use]
    pub fn conversations(&self) -> Vec<Conversation> {
        self.lock().conversations.clone()
    }

    /// Current transcript snapshot, already reformatted for display.
    #[must_use]
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Suppress the local in-progress indicator. Does not abort anything;
    /// a reconciling reload from the in-flight call may still apply.
    pub fn dismiss(&self) {
        self.lock().pending = None;
    }

    // ----- conversation lifecycle -----

    /// Refresh the known conversation list from the backend.
    ///
    /// If the active conversation vanished server-side, the manager resets
    /// to `NoSession` so the pointer never dangles.
    #[instrument(skip(self))]
    pub async fn load_conversations(&self) -> Result<Vec<Conversation>> {
        let token = self.begin();
        let list = self.gateway.list_conversations(&self.workflow_id).await?;
        let mut inner = self.lock();
        if inner.seq == token {
            let vanished = inner
                .active
                .as_ref()
                .is_some_and(|active| !list.iter().any(|c| &c.id == active));
            if vanished {
                inner.active = None;
                inner.messages = vec![welcome()];
            }
            inner.conversations = list.clone();
        }
        Ok(list)
    }

    /// Create a new conversation and make it active with a reset transcript.
    #[instrument(skip(self))]
    pub async fn create_conversation(&self) -> Result<Conversation> {
        let token = self.begin();
        let convo = self.gateway.create_conversation(&self.workflow_id).await?;
        let mut inner = self.lock();
        if inner.seq == token {
            inner.conversations.push(convo.clone());
            inner.active = Some(convo.id.clone());
            inner.messages = vec![welcome()];
            inner.pending = None;
        }
        Ok(convo)
    }

    /// Activate another conversation, replacing the transcript with its
    /// reloaded history. No-op when it is already active.
    #[instrument(skip(self))]
    pub async fn switch_conversation(&self, conversation_id: &str) -> Result<()> {
        {
            let inner = self.lock();
            if inner.active.as_deref() == Some(conversation_id) {
                return Ok(());
            }
            if !inner.conversations.iter().any(|c| c.id == conversation_id) {
                return Err(SessionError::UnknownConversation(
                    conversation_id.to_string(),
                ));
            }
        }
        let token = self.begin();
        let history = self.gateway.list_messages(conversation_id).await?;
        let mut inner = self.lock();
        if inner.seq == token {
            inner.active = Some(conversation_id.to_string());
            inner.messages = transcript_or_welcome(reformat_history(history));
            inner.pending = None;
        }
        Ok(())
    }

    /// Delete a conversation. When it was active, the first remaining
    /// conversation takes over (history reloaded); when none remain, the
    /// manager resets to `NoSession` with the welcome transcript.
    #[instrument(skip(self))]
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let token = self.begin();
        self.gateway.delete_conversation(conversation_id).await?;

        let successor = {
            let mut inner = self.lock();
            inner.conversations.retain(|c| c.id != conversation_id);
            if inner.active.as_deref() != Some(conversation_id) {
                return Ok(());
            }
            // The pointer must never dangle on a deleted id, so it moves
            // immediately; the successor's history follows under the guard.
            match inner.conversations.first().map(|c| c.id.clone()) {
                Some(next) => {
                    inner.active = Some(next.clone());
                    inner.messages = vec![welcome()];
                    Some(next)
                }
                None => {
                    inner.active = None;
                    inner.messages = vec![welcome()];
                    inner.pending = None;
                    None
                }
            }
        };

        if let Some(next_id) = successor {
            let history = self.gateway.list_messages(&next_id).await?;
            let mut inner = self.lock();
            if inner.seq == token {
                inner.messages = transcript_or_welcome(reformat_history(history));
                inner.pending = None;
            }
        }
        Ok(())
    }

    // ----- execution -----

    /// Dispatch an execution request.
    ///
    /// With `record_conversation` off this is a bare call: the raw result
    /// is exposed and the transcript is untouched. With it on, an active
    /// conversation is ensured (auto-created if absent), the input is
    /// appended optimistically, and after the call resolves the transcript
    /// is replaced by the authoritative server history.
    #[instrument(skip(self, input, options))]
    pub async fn execute(
        &self,
        input: &str,
        options: &ExecutionOptions,
    ) -> Result<ExecutionOutcome> {
        if input.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }
        if options.record_conversation {
            self.execute_recorded(input, options).await
        } else {
            self.execute_bare(input, options).await
        }
    }

    async fn execute_bare(
        &self,
        input: &str,
        options: &ExecutionOptions,
    ) -> Result<ExecutionOutcome> {
        let token = self.begin_pending();
        let dispatched = self.gateway.execute(&self.workflow_id, input, options).await;
        self.settle(token);
        Ok(ExecutionOutcome {
            result: dispatched?,
            conversation_id: None,
        })
    }

    async fn execute_recorded(
        &self,
        input: &str,
        options: &ExecutionOptions,
    ) -> Result<ExecutionOutcome> {
        let token = self.begin_pending();

        // Snapshot before matching so the guard drops here; the None arm
        // below awaits, and the state lock must never be held across it.
        let active = self.lock().active.clone();
        let conversation_id = match active {
            Some(id) => id,
            None => {
                let convo = match self.gateway.create_conversation(&self.workflow_id).await {
                    Ok(convo) => convo,
                    Err(err) => {
                        self.settle(token);
                        return Err(err.into());
                    }
                };
                let mut inner = self.lock();
                if inner.seq == token {
                    inner.conversations.push(convo.clone());
                    inner.active = Some(convo.id.clone());
                    inner.messages = vec![welcome()];
                }
                convo.id
            }
        };

        // Optimistic append before dispatch; superseded (not merged) by the
        // authoritative reload below, and left visible on failure.
        {
            let mut inner = self.lock();
            if inner.seq == token {
                inner.messages.push(ChatMessage::user(input));
            }
        }

        let data = match self
            .gateway
            .execute_recorded(&self.workflow_id, &conversation_id, input, options)
            .await
        {
            Ok(data) => data,
            Err(err) => {
                self.settle(token);
                return Err(err.into());
            }
        };

        // Adopt a server-assigned conversation id and refresh the list.
        let conversation_id = match adopted_conversation_id(&data, &conversation_id) {
            Some(new_id) => {
                tracing::debug!(%new_id, "backend adopted a different conversation");
                match self.gateway.list_conversations(&self.workflow_id).await {
                    Ok(list) => {
                        let mut inner = self.lock();
                        if inner.seq == token {
                            inner.conversations = list;
                            inner.active = Some(new_id.clone());
                        }
                        new_id
                    }
                    Err(err) => {
                        self.settle(token);
                        return Err(err.into());
                    }
                }
            }
            None => conversation_id,
        };

        // Unconditional authoritative reload; discarded only when a newer
        // operation has taken over the transcript.
        match self.gateway.list_messages(&conversation_id).await {
            Ok(history) => {
                let mut inner = self.lock();
                if inner.seq == token {
                    inner.messages = transcript_or_welcome(reformat_history(history));
                } else {
                    tracing::debug!(token, "discarding stale history reconciliation");
                }
                // Discarded or not, this execution is over; the flag it
                // raised must not outlive it.
                if inner.pending == Some(token) {
                    inner.pending = None;
                }
            }
            Err(err) => {
                self.settle(token);
                return Err(err.into());
            }
        }

        Ok(ExecutionOutcome {
            result: data,
            conversation_id: Some(conversation_id),
        })
    }
}

fn welcome() -> ChatMessage {
    ChatMessage::system(WELCOME_MESSAGE)
}

fn transcript_or_welcome(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    if messages.is_empty() {
        vec![welcome()]
    } else {
        messages
    }
}

/// Pull a server-assigned conversation id out of an execution reply,
/// returning it only when it differs from the requested one.
fn adopted_conversation_id(data: &Value, requested: &str) -> Option<String> {
    let id = data
        .get("conversation_id")
        .or_else(|| data.get("session_id"))
        .and_then(Value::as_str)?;
    (id != requested).then(|| id.to_string())
}

/// Reformat stored history for display: content that parses as JSON with a
/// recognizable `text` or `content` field shows that field instead of the
/// raw serialization. Lenient by design — malformed or plain content passes
/// through unchanged and never raises.
fn reformat_history(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    messages
        .into_iter()
        .map(|mut msg| {
            msg.content = display_content(&msg.content);
            msg
        })
        .collect()
}

fn display_content(content: &str) -> String {
    let trimmed = content.trim_start();
    if !trimmed.starts_with('{') {
        return content.to_string();
    }
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => map
            .get("text")
            .or_else(|| map.get("content"))
            .and_then(Value::as_str)
            .map_or_else(|| content.to_string(), str::to_string),
        _ => content.to_string(),
    }
}
