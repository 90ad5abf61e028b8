pub mod backend;

pub use backend::*;

use std::sync::Arc;

use flowdeck::gateway::Gateway;
use flowdeck::store::GraphStore;

/// A gateway wired to a fresh scripted backend.
#[allow(dead_code)]
pub fn gateway() -> (Arc<FakeBackend>, Arc<Gateway>) {
    let backend = Arc::new(FakeBackend::new());
    let gateway = Arc::new(Gateway::new(backend.clone()));
    (backend, gateway)
}

/// A store over a fresh backend with one open workflow named "demo".
#[allow(dead_code)]
pub async fn store_with_workflow() -> (Arc<FakeBackend>, GraphStore) {
    let (backend, gateway) = gateway();
    let mut store = GraphStore::new(gateway);
    store
        .create_workflow("demo", "test workflow")
        .await
        .expect("workflow creation");
    (backend, store)
}
