use crate::config::NodeConfig;
use crate::peers::{announce, run_consensus, NodeAddress, PeerClient};
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{
    now_timestamp, Block, Chain, ChainSnapshot, Ledger, LedgerError, MineOutcome, Transaction,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub peers: PeerClient,
    pub config: Arc<NodeConfig>,
}

impl AppState {
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;
        let peers = PeerClient::new(config.peer_timeout)?;
        Ok(Self {
            ledger: Arc::new(Ledger::with_difficulty(config.difficulty)),
            peers,
            config: Arc::new(config),
        })
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Rejected(#[from] LedgerError),

    #[error("peer request failed: {0:#}")]
    Upstream(anyhow::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) | ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MineResult {
    pub mined: bool,
    pub index: Option<u64>,
    pub message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/new_transaction", post(new_transaction))
        .route("/chain", get(get_chain))
        .route("/mine", get(mine))
        .route("/consensus", get(consensus))
        .route("/pending_tx", get(pending_tx))
        .route("/register_node", post(register_node))
        .route("/register_with", post(register_with))
        .route("/add_block", post(add_block))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Truthiness of a required field: present, not null, and not empty/zero/false.
fn is_filled(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

async fn new_transaction(
    State(state): State<AppState>,
    Json(mut tx): Json<Transaction>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(missing) = state
        .config
        .required_fields
        .iter()
        .find(|field| !is_filled(tx.get(field.as_str())))
    {
        return Err(ApiError::BadRequest(format!(
            "invalid transaction data: missing {missing}"
        )));
    }
    tx.insert("timestamp".into(), json!(now_timestamp()));
    state.ledger.submit_transaction(tx);
    Ok((StatusCode::CREATED, Json(json!({ "accepted": true }))))
}

async fn get_chain(State(state): State<AppState>) -> Json<ChainSnapshot> {
    Json(state.ledger.chain_snapshot())
}

async fn pending_tx(State(state): State<AppState>) -> Json<Vec<Transaction>> {
    Json(state.ledger.pending_transactions())
}

/// Mine pending transactions, then make sure no peer got ahead of us before
/// telling the network about the new block.
async fn mine(State(state): State<AppState>) -> Result<Json<MineResult>, ApiError> {
    let ledger = state.ledger.clone();
    let outcome = tokio::task::spawn_blocking(move || ledger.trigger_mine()).await?;

    let result = match outcome {
        MineOutcome::NoPendingTx => MineResult {
            mined: false,
            index: None,
            message: "no transactions to mine".into(),
        },
        MineOutcome::Discarded => MineResult {
            mined: false,
            index: None,
            message: "chain moved while mining; block discarded".into(),
        },
        MineOutcome::MinedBlock(index) => {
            let mined = state.ledger.block(index);
            run_consensus(&state).await;
            // Announce our block only if it is still part of the local chain.
            if let Some(block) = mined.filter(|b| state.ledger.block(index).as_ref() == Some(b)) {
                announce(&state, &block).await;
            }
            MineResult {
                mined: true,
                index: Some(index),
                message: format!("block #{index} was mined"),
            }
        }
    };
    Ok(Json(result))
}

async fn consensus(State(state): State<AppState>) -> Json<Value> {
    let replaced = run_consensus(&state).await;
    Json(json!({ "replaced": replaced, "length": state.ledger.len() }))
}

async fn register_node(
    State(state): State<AppState>,
    Json(body): Json<NodeAddress>,
) -> Result<Json<ChainSnapshot>, ApiError> {
    if body.node_address.trim().is_empty() {
        return Err(ApiError::BadRequest("invalid node_address".into()));
    }
    state.ledger.register_peer(&body.node_address);
    Ok(Json(state.ledger.chain_snapshot()))
}

/// Join the network through `node_address`: register with it, rebuild our
/// chain from its dump and take over its peer list.
async fn register_with(
    State(state): State<AppState>,
    Json(body): Json<NodeAddress>,
) -> Result<impl IntoResponse, ApiError> {
    let remote = body.node_address.trim().trim_end_matches('/').to_owned();
    if remote.is_empty() {
        return Err(ApiError::BadRequest("invalid node_address".into()));
    }

    let me = state.config.advertise.clone();
    let ChainSnapshot {
        chain: dump,
        peers: remote_peers,
        ..
    } = state
        .peers
        .register_with(&remote, &me)
        .await
        .map_err(ApiError::Upstream)?;
    let difficulty = state.ledger.difficulty();
    let chain = tokio::task::spawn_blocking(move || Chain::from_dump(dump, difficulty)).await??;
    let length = chain.len();
    state.ledger.install(chain);

    state.ledger.register_peer(&remote);
    for peer in remote_peers.iter().filter(|p| p.trim_end_matches('/') != me) {
        state.ledger.register_peer(peer);
    }
    info!(%remote, length, "registered with node");
    Ok((StatusCode::OK, Json(json!({ "registered": true, "length": length }))))
}

async fn add_block(
    State(state): State<AppState>,
    Json(block): Json<Block>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(claimed) = block.hash.clone() else {
        return Err(ApiError::BadRequest("block record has no hash".into()));
    };
    if !state.ledger.receive_block(block, &claimed) {
        return Err(ApiError::BadRequest("block was discarded by the node".into()));
    }
    Ok((StatusCode::CREATED, Json(json!({ "added": true }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_field_truthiness() {
        assert!(!is_filled(None));
        assert!(!is_filled(Some(&Value::Null)));
        assert!(!is_filled(Some(&json!(""))));
        assert!(!is_filled(Some(&json!(0))));
        assert!(!is_filled(Some(&json!(false))));
        assert!(!is_filled(Some(&json!([]))));
        assert!(!is_filled(Some(&json!({}))));
        assert!(is_filled(Some(&json!("alice"))));
        assert!(is_filled(Some(&json!(3))));
        assert!(is_filled(Some(&json!({ "k": 1 }))));
    }

    #[test]
    fn app_state_rejects_unreachable_difficulty() {
        let mut config = NodeConfig::new("127.0.0.1:0".parse().unwrap());
        config.difficulty = 65;
        assert!(AppState::new(config).is_err());
    }

    #[test]
    fn api_error_status_codes() {
        let bad = ApiError::BadRequest("x".into()).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        let rejected = ApiError::from(LedgerError::EmptyPendingPool).into_response();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        let upstream = ApiError::Upstream(anyhow::anyhow!("down")).into_response();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
    }
}
