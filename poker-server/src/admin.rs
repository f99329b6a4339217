//! The admin control plane: a second, separately-bound axum router
//! exposing operator-only endpoints. The dashboard UI and its
//! session/cookie auth are out of scope here; this only defines the
//! operations themselves, left behind a network boundary (bind it to a
//! private interface) rather than behind an in-process auth layer.

use crate::config::ConfigStore;
use crate::persistence::Db;
use crate::router::AppState;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
pub struct AdminState {
    pub app: Arc<AppState>,
    pub db: Arc<Db>,
    pub config: Arc<ConfigStore>,
}

#[derive(Serialize)]
pub struct UserSummary {
    pub user_id: i64,
    pub email: String,
    pub username: String,
    pub suspended: bool,
}

#[derive(Deserialize)]
pub struct AdjustBalanceRequest {
    pub amount: i64,
    pub reason: String,
}

#[derive(Deserialize)]
pub struct SuspendRequest {
    pub suspended: bool,
}

#[derive(Serialize)]
pub struct PendingWithdrawal {
    pub transaction_id: i64,
    pub user_id: i64,
    pub amount: i64,
}

#[derive(Deserialize)]
pub struct BroadcastRequest {
    pub message: String,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:user_id/balance", post(adjust_balance))
        .route("/admin/users/:user_id/suspend", post(set_suspended))
        .route("/admin/withdrawals", get(list_withdrawals))
        .route("/admin/withdrawals/:transaction_id/approve", post(approve_withdrawal))
        .route("/admin/withdrawals/:transaction_id/reject", post(reject_withdrawal))
        .route("/admin/tables/:table_id", axum::routing::delete(delete_table))
        .route("/admin/broadcast", post(broadcast))
        .route("/admin/config", get(get_config).put(update_config))
        .with_state(state)
}

async fn list_users(State(state): State<AdminState>) -> Json<Vec<UserSummary>> {
    let users = state.db.list_users().await.unwrap_or_default();
    Json(
        users
            .into_iter()
            .map(|u| UserSummary { user_id: u.id, email: u.email, username: u.username, suspended: u.suspended })
            .collect(),
    )
}

async fn adjust_balance(State(state): State<AdminState>, Path(user_id): Path<i64>, Json(body): Json<AdjustBalanceRequest>) -> Json<serde_json::Value> {
    let uid = format!("u{user_id}");
    match state.app.ledger.admin_adjust(&uid, body.amount, &body.reason, now_unix()) {
        Ok(wallet) => {
            let _ = state.db.persist_wallet_balance(user_id, wallet.balance, wallet.total_deposited, wallet.total_withdrawn).await;
            Json(serde_json::json!({ "ok": true, "balance": wallet.balance }))
        }
        Err(e) => Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
    }
}

async fn set_suspended(State(state): State<AdminState>, Path(user_id): Path<i64>, Json(body): Json<SuspendRequest>) -> Json<serde_json::Value> {
    match state.db.set_user_suspended(user_id, body.suspended).await {
        Ok(()) => Json(serde_json::json!({ "ok": true })),
        Err(e) => Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
    }
}

async fn list_withdrawals(State(state): State<AdminState>) -> Json<Vec<PendingWithdrawal>> {
    let rows = state.db.list_pending_withdrawals().await.unwrap_or_default();
    Json(rows.into_iter().map(|(transaction_id, user_id, amount)| PendingWithdrawal { transaction_id, user_id, amount }).collect())
}

async fn approve_withdrawal(State(state): State<AdminState>, Path(transaction_id): Path<u64>) -> Json<serde_json::Value> {
    match state.app.ledger.approve_withdrawal(transaction_id, now_unix()) {
        Ok(()) => Json(serde_json::json!({ "ok": true })),
        Err(e) => Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
    }
}

async fn reject_withdrawal(State(state): State<AdminState>, Path(transaction_id): Path<u64>) -> Json<serde_json::Value> {
    match state.app.ledger.reject_withdrawal(transaction_id) {
        Ok(()) => Json(serde_json::json!({ "ok": true })),
        Err(e) => Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
    }
}

async fn delete_table(State(state): State<AdminState>, Path(table_id): Path<String>) -> Json<serde_json::Value> {
    state.app.tables.remove(&table_id);
    Json(serde_json::json!({ "ok": true }))
}

async fn broadcast(State(state): State<AdminState>, Json(body): Json<BroadcastRequest>) -> Json<serde_json::Value> {
    let event = crate::protocol::ServerEvent::Chat { table_id: "system".to_string(), user_id: "admin".to_string(), message: body.message };
    match serde_json::to_string(&event) {
        Ok(payload) => {
            state.app.session.broadcast_all(&payload);
            Json(serde_json::json!({ "ok": true }))
        }
        Err(e) => Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
    }
}

async fn get_config(State(state): State<AdminState>) -> Json<crate::config::ServerConfig> {
    Json(state.config.get())
}

async fn update_config(State(state): State<AdminState>, Json(patch): Json<crate::config::ServerConfig>) -> Json<crate::config::ServerConfig> {
    let updated = state.config.update(|cfg| *cfg = patch);
    Json(updated)
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).expect("clock before epoch").as_secs() as i64
}
