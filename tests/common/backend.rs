#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value, json};
use tokio::time::{Duration, sleep};

use flowdeck::model::{ChatMessage, Conversation, NodeRef, Workflow};
use flowdeck::transport::{Transport, TransportError, ops};

/// Scripted in-memory backend for integration tests.
///
/// Holds the authoritative workflow/conversation state the way a real host
/// would, including server-side index renumbering on node insert, delete,
/// and move. Replies are deliberately wrapped in different envelope shapes
/// per operation family so the normalization path gets exercised end to end:
///
/// - workflow ops reply in the canonical `{success, message, data}` shape
/// - node ops reply in the coded `{code: 200, success: true, ...}` shape
/// - conversation ops reply in the `{status: "success", ...}` shape
pub struct FakeBackend {
    world: Mutex<World>,
    fail_ops: Mutex<HashMap<String, String>>,
    drop_ops: Mutex<HashSet<String>>,
    slow_ops: Mutex<HashMap<String, u64>>,
}

#[derive(Default)]
struct World {
    counter: u64,
    workflows: Vec<Workflow>,
    conversations: Vec<Conversation>,
    messages: HashMap<String, Vec<ChatMessage>>,
    adopt_next: Option<String>,
}

impl World {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}{}", self.counter)
    }

    fn workflow_mut(&mut self, id: &str) -> Option<&mut Workflow> {
        self.workflows.iter_mut().find(|w| w.id == id)
    }

    fn renumber(workflow: &mut Workflow) {
        for (i, node) in workflow.nodes.iter_mut().enumerate() {
            node.index = i;
        }
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            world: Mutex::new(World::default()),
            fail_ops: Mutex::new(HashMap::new()),
            drop_ops: Mutex::new(HashSet::new()),
            slow_ops: Mutex::new(HashMap::new()),
        }
    }

    /// Make `op` reply with a business failure carrying `message`.
    pub fn fail_op(&self, op: &str, message: &str) {
        self.fail_ops
            .lock()
            .unwrap()
            .insert(op.to_string(), message.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_ops.lock().unwrap().clear();
        self.drop_ops.lock().unwrap().clear();
    }

    /// Make `op` fail at the transport level (connection dropped).
    pub fn drop_op(&self, op: &str) {
        self.drop_ops.lock().unwrap().insert(op.to_string());
    }

    /// Delay `op` replies by `ms` milliseconds.
    pub fn slow_op(&self, op: &str, ms: u64) {
        self.slow_ops.lock().unwrap().insert(op.to_string(), ms);
    }

    /// The next recorded execution reports `id` as the conversation it
    /// recorded into, regardless of the id the client asked for.
    pub fn adopt_conversation(&self, id: &str) {
        self.world.lock().unwrap().adopt_next = Some(id.to_string());
    }

    /// Authoritative message log for a conversation, as the server holds it.
    pub fn messages_for(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.world
            .lock()
            .unwrap()
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn node_ids(&self, workflow_id: &str) -> Vec<String> {
        let world = self.world.lock().unwrap();
        world
            .workflows
            .iter()
            .find(|w| w.id == workflow_id)
            .map(|w| w.nodes.iter().map(|n| n.id.clone()).collect())
            .unwrap_or_default()
    }

    fn node_types() -> Value {
        json!([
            {"name": "Start", "label": "Start", "capabilities": []},
            {"name": "End", "label": "End", "capabilities": []},
            {"name": "Chat", "label": "Chat", "capabilities": ["stateful_memory"]},
            {"name": "LLM", "label": "LLM Call", "capabilities": []},
        ])
    }

    fn default_flow_config(node_type: &str) -> Value {
        let mut map = Map::new();
        map.insert("display_name".into(), json!(node_type));
        map.insert("status".into(), json!("idle"));
        if node_type == "Chat" {
            map.insert("conversation_id".into(), json!(""));
            map.insert("history_rounds".into(), json!(4));
        }
        Value::Object(map)
    }

    fn default_work_config(node_type: &str) -> Value {
        match node_type {
            "Chat" | "LLM" => json!({
                "model": "gpt-4o-mini",
                "system_prompt": "You are a helpful assistant.",
                "temperature": 0.7,
            }),
            _ => json!({}),
        }
    }

    fn handle(&self, op: &str, payload: &Value) -> Value {
        let mut world = self.world.lock().unwrap();
        match op {
            ops::CREATE_WORKFLOW => {
                let id = world.next_id("w");
                let workflow = Workflow {
                    id,
                    name: payload["name"].as_str().unwrap_or_default().to_string(),
                    description: payload["description"].as_str().unwrap_or_default().to_string(),
                    nodes: Vec::new(),
                    created_at: Some(Utc::now()),
                    updated_at: Some(Utc::now()),
                };
                let data = serde_json::to_value(&workflow).unwrap();
                world.workflows.push(workflow);
                data
            }
            ops::GET_WORKFLOW => {
                let id = payload["workflow_id"].as_str().unwrap_or_default();
                match world.workflows.iter().find(|w| w.id == id) {
                    Some(w) => serde_json::to_value(w).unwrap(),
                    None => return json!({"success": false, "message": "workflow not found"}),
                }
            }
            ops::LIST_WORKFLOWS => serde_json::to_value(&world.workflows).unwrap(),
            ops::UPDATE_WORKFLOW => {
                let id = payload["workflow_id"].as_str().unwrap_or_default().to_string();
                let patch = payload["patch"].clone();
                match world.workflow_mut(&id) {
                    Some(w) => {
                        if let Some(name) = patch["name"].as_str() {
                            w.name = name.to_string();
                        }
                        if let Some(desc) = patch["description"].as_str() {
                            w.description = desc.to_string();
                        }
                        w.updated_at = Some(Utc::now());
                        Value::Null
                    }
                    None => return json!({"success": false, "message": "workflow not found"}),
                }
            }
            ops::DELETE_WORKFLOW => {
                let id = payload["workflow_id"].as_str().unwrap_or_default();
                world.workflows.retain(|w| w.id != id);
                Value::Null
            }
            ops::ADD_NODE => {
                let wid = payload["workflow_id"].as_str().unwrap_or_default().to_string();
                let node_id = world.next_id("n");
                let node = NodeRef {
                    id: node_id,
                    node_type: payload["node_type"].as_str().unwrap_or_default().to_string(),
                    index: 0,
                    flow_config: payload["flow_config"].as_object().cloned().unwrap_or_default(),
                    work_config: payload["work_config"].as_object().cloned().unwrap_or_default(),
                };
                match world.workflow_mut(&wid) {
                    Some(w) => {
                        let at = payload["index"]
                            .as_u64()
                            .map_or(w.nodes.len(), |i| (i as usize).min(w.nodes.len()));
                        w.nodes.insert(at, node);
                        World::renumber(w);
                        w.updated_at = Some(Utc::now());
                        Value::Null
                    }
                    None => return json!({"success": false, "message": "workflow not found"}),
                }
            }
            ops::UPDATE_NODE => {
                let nid = payload["node_id"].as_str().unwrap_or_default().to_string();
                match world
                    .workflows
                    .iter_mut()
                    .flat_map(|w| w.nodes.iter_mut())
                    .find(|n| n.id == nid)
                {
                    Some(node) => {
                        if let Some(fc) = payload["patch"]["flow_config"].as_object() {
                            node.flow_config = fc.clone();
                        }
                        if let Some(wc) = payload["patch"]["work_config"].as_object() {
                            node.work_config = wc.clone();
                        }
                        Value::Null
                    }
                    None => return json!({"success": false, "message": "node not found"}),
                }
            }
            ops::DELETE_NODE => {
                let nid = payload["node_id"].as_str().unwrap_or_default().to_string();
                match world
                    .workflows
                    .iter_mut()
                    .find(|w| w.nodes.iter().any(|n| n.id == nid))
                {
                    Some(w) => {
                        w.nodes.retain(|n| n.id != nid);
                        World::renumber(w);
                        Value::Null
                    }
                    None => return json!({"success": false, "message": "node not found"}),
                }
            }
            ops::MOVE_NODE => {
                let nid = payload["node_id"].as_str().unwrap_or_default().to_string();
                let new_index = payload["new_index"].as_u64().unwrap_or(0) as usize;
                match world
                    .workflows
                    .iter_mut()
                    .find(|w| w.nodes.iter().any(|n| n.id == nid))
                {
                    Some(w) => {
                        let Some(from) = w.nodes.iter().position(|n| n.id == nid) else {
                            return json!({"success": false, "message": "node not found"});
                        };
                        let node = w.nodes.remove(from);
                        let at = new_index.min(w.nodes.len());
                        w.nodes.insert(at, node);
                        World::renumber(w);
                        Value::Null
                    }
                    None => return json!({"success": false, "message": "node not found"}),
                }
            }
            ops::LIST_NODE_TYPES => Self::node_types(),
            ops::DEFAULT_FLOW_CONFIG => {
                Self::default_flow_config(payload["node_type"].as_str().unwrap_or_default())
            }
            ops::DEFAULT_WORK_CONFIG => {
                Self::default_work_config(payload["node_type"].as_str().unwrap_or_default())
            }
            ops::EXECUTE_WORKFLOW => {
                let input = payload["input"].as_str().unwrap_or_default();
                json!({"output": format!("echo: {input}")})
            }
            ops::EXECUTE_WORKFLOW_RECORDED => {
                let input = payload["input"].as_str().unwrap_or_default().to_string();
                let requested = payload["conversation_id"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                let target = world.adopt_next.take().unwrap_or(requested);
                if !world.conversations.iter().any(|c| c.id == target) {
                    let wid = payload["workflow_id"].as_str().unwrap_or_default().to_string();
                    world.conversations.push(Conversation {
                        id: target.clone(),
                        workflow_id: wid,
                        title: String::new(),
                        created_at: Some(Utc::now()),
                    });
                }
                let log = world.messages.entry(target.clone()).or_default();
                log.push(ChatMessage::user(&input));
                log.push(ChatMessage::assistant(
                    json!({"text": format!("echo: {input}")}).to_string(),
                ));
                json!({
                    "result": {"output": format!("echo: {input}")},
                    "conversation_id": target,
                })
            }
            ops::CREATE_CONVERSATION => {
                let id = world.next_id("c");
                let conversation = Conversation {
                    id: id.clone(),
                    workflow_id: payload["workflow_id"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    title: payload["title"].as_str().unwrap_or_default().to_string(),
                    created_at: Some(Utc::now()),
                };
                let data = serde_json::to_value(&conversation).unwrap();
                world.conversations.push(conversation);
                world.messages.insert(id, Vec::new());
                data
            }
            ops::LIST_CONVERSATIONS => {
                let wid = payload["workflow_id"].as_str().unwrap_or_default();
                let convos: Vec<_> = world
                    .conversations
                    .iter()
                    .filter(|c| c.workflow_id == wid)
                    .collect();
                serde_json::to_value(&convos).unwrap()
            }
            ops::DELETE_CONVERSATION => {
                let id = payload["conversation_id"].as_str().unwrap_or_default().to_string();
                world.conversations.retain(|c| c.id != id);
                world.messages.remove(&id);
                Value::Null
            }
            ops::LIST_MESSAGES => {
                let id = payload["conversation_id"].as_str().unwrap_or_default();
                let log = world.messages.get(id).cloned().unwrap_or_default();
                serde_json::to_value(&log).unwrap()
            }
            other => return json!({"success": false, "message": format!("unknown op {other}")}),
        }
    }

    fn wrap(op: &str, data: Value) -> Value {
        // Already a failure reply produced inside handle().
        if data.get("success") == Some(&Value::Bool(false)) {
            return data;
        }
        if op.contains("conversation") || op == ops::LIST_MESSAGES {
            json!({"status": "success", "message": "ok", "data": data})
        } else if op.contains("node") || op.starts_with("execute") {
            json!({"code": 200, "success": true, "data": data})
        } else {
            json!({"success": true, "message": "ok", "data": data})
        }
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn invoke(&self, op: &str, payload: Value) -> Result<Value, TransportError> {
        let delay = self.slow_ops.lock().unwrap().get(op).copied();
        if let Some(ms) = delay {
            sleep(Duration::from_millis(ms)).await;
        }
        if self.drop_ops.lock().unwrap().contains(op) {
            return Err(TransportError::Disconnected("backend went away".into()));
        }
        if let Some(message) = self.fail_ops.lock().unwrap().get(op).cloned() {
            return Ok(json!({"success": false, "message": message}));
        }
        Ok(Self::wrap(op, self.handle(op, &payload)))
    }
}
