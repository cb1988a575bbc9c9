#![allow(dead_code)]

use axum::Router;
use ledger_core::{MineOutcome, Transaction};
use ledger_node::{router, AppState, NodeConfig};
use rand::Rng;
use serde_json::json;
use tokio::net::TcpListener;

pub struct TestNode {
    pub url: String,
    pub state: AppState,
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server crashed");
    });
    format!("http://{addr}")
}

pub async fn spawn_node() -> TestNode {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let state = AppState::new(NodeConfig::new(addr)).expect("app state");
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server crashed");
    });
    TestNode {
        url: format!("http://{addr}"),
        state,
    }
}

pub fn tx(content: &str) -> Transaction {
    let mut t = Transaction::new();
    t.insert("author".into(), json!("alice"));
    t.insert("content".into(), json!(content));
    t
}

/// Mine `blocks` blocks straight through the node's ledger.
pub fn grow(node: &TestNode, blocks: usize) {
    for _ in 0..blocks {
        let n: u64 = rand::thread_rng().gen();
        node.state.ledger.submit_transaction(tx(&format!("grow-{n}")));
        assert!(matches!(
            node.state.ledger.trigger_mine(),
            MineOutcome::MinedBlock(_)
        ));
    }
}
