//! The connected dispatcher. One `handle` call per inbound `ClientAction`,
//! turning it into calls against the ledger, the table registry, auth and
//! persistence, and back into the outbound `ServerEvent`s for this
//! connection. `TableUpdate` broadcasts to *other* viewers are not part of
//! this return value — `table_actor` emits those itself after every
//! mutation, through the `Broadcaster`. This only returns what the
//! connection that sent the request should hear back directly.
//!
//! Wallet/table/registry lock ordering follows one fixed rule: a wallet
//! debit always happens before the table mutation it pays for, and is
//! refunded if the table step then fails.

use crate::auth;
use crate::config::ConfigStore;
use crate::error::ApiError;
use crate::payment::PaymentProvider;
use crate::persistence::{Db, PrivateGameRecord};
use crate::protocol::{ClientAction, ServerEvent, TableStateWire};
use crate::session::{ConnectionId, SessionRegistry};
use crate::tables::TableRegistry;
use poker_engine::table::Action;
use poker_engine::wallet::UserId;
use poker_engine::Ledger;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct AppState {
    pub db: Arc<Db>,
    pub ledger: Arc<Ledger>,
    pub session: Arc<SessionRegistry>,
    pub tables: Arc<TableRegistry>,
    pub config: Arc<ConfigStore>,
    pub payments: Arc<dyn PaymentProvider>,
    seated: Mutex<HashMap<UserId, String>>,
    deposit_orders: Mutex<HashMap<String, u64>>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<Db>,
        ledger: Arc<Ledger>,
        session: Arc<SessionRegistry>,
        tables: Arc<TableRegistry>,
        config: Arc<ConfigStore>,
        payments: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            db,
            ledger,
            session,
            tables,
            config,
            payments,
            seated: Mutex::new(HashMap::new()),
            deposit_orders: Mutex::new(HashMap::new()),
        }
    }

    fn seat_user(&self, user: &str, table_id: &str) {
        self.seated.lock().unwrap().insert(user.to_string(), table_id.to_string());
    }

    fn unseat_user(&self, user: &str) {
        self.seated.lock().unwrap().remove(user);
    }

    fn table_of(&self, user: &str) -> Option<String> {
        self.seated.lock().unwrap().get(user).cloned()
    }

    /// Used by the connection loop on disconnect to find which table (if
    /// any) a dropped connection's user was seated at.
    pub fn seated_table(&self, user: &str) -> Option<String> {
        self.table_of(user)
    }
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("clock before epoch").as_secs() as i64
}

fn uid_for(user_id: i64) -> UserId {
    format!("u{user_id}")
}

fn numeric_id(uid: &str) -> i64 {
    uid.strip_prefix('u').and_then(|s| s.parse().ok()).unwrap_or(0)
}

async fn persist_balance(state: &AppState, uid: &str) {
    if let Ok(wallet) = state.ledger.balance(uid) {
        let _ = state.db.persist_wallet_balance(numeric_id(uid), wallet.balance, wallet.total_deposited, wallet.total_withdrawn).await;
    }
}

pub async fn handle(state: &AppState, conn: ConnectionId, action: ClientAction) -> Vec<ServerEvent> {
    let message_id = action.message_id();
    match dispatch(state, conn, action).await {
        Ok(events) => events,
        Err(e) => vec![ServerEvent::Error { error: e.to_string(), message_id }],
    }
}

async fn dispatch(state: &AppState, conn: ConnectionId, action: ClientAction) -> Result<Vec<ServerEvent>, ApiError> {
    match action {
        ClientAction::Register { email, username, password, security_question_index, security_answer, message_id } => {
            let user = auth::register(&state.db, &email, &username, &password, security_question_index, &security_answer).await?;
            let uid = uid_for(user.id);
            state.ledger.open_wallet(&uid);
            state.session.bind_user(conn, uid.clone());
            Ok(vec![ServerEvent::Connected, ServerEvent::RegisterOk { user_id: uid, message_id }])
        }
        ClientAction::Login { email, password, message_id } => {
            let user = auth::login(&state.db, &email, &password).await?;
            let uid = uid_for(user.id);
            state.ledger.open_wallet(&uid);
            state.session.bind_user(conn, uid.clone());
            if let Some(table_id) = state.session.rebindable_table(&uid) {
                state.session.note_reconnected(&uid);
                if let Some(handle) = state.tables.get(&table_id) {
                    handle.mark_connected(uid.clone(), true);
                    state.seat_user(&uid, &table_id);
                }
            }
            Ok(vec![ServerEvent::Connected, ServerEvent::LoginOk { user_id: uid, username: user.username, message_id }])
        }
        ClientAction::Ping { message_id } => Ok(vec![ServerEvent::Pong { message_id }]),

        other => {
            let uid = state.session.user_for(conn).ok_or(ApiError::NotAuthenticated)?;
            authenticated(state, uid, other).await
        }
    }
}

async fn authenticated(state: &AppState, uid: UserId, action: ClientAction) -> Result<Vec<ServerEvent>, ApiError> {
    match action {
        ClientAction::Register { .. } | ClientAction::Login { .. } | ClientAction::Ping { .. } => unreachable!("handled before authentication"),

        ClientAction::GetWallet { message_id } => {
            let wallet = state.ledger.balance(&uid)?;
            Ok(vec![ServerEvent::Wallet { balance: wallet.balance, total_deposited: wallet.total_deposited, total_withdrawn: wallet.total_withdrawn, message_id }])
        }

        ClientAction::WalletDeposit { amount, method, message_id } => {
            let order = state.payments.create_order(amount, "USD", "wallet deposit").await.map_err(|e| ApiError::PaymentProvider(e.0))?;
            let tx_id = state.ledger.start_deposit(&uid, amount, &order.order_id, now_unix())?;
            state.deposit_orders.lock().unwrap().insert(order.order_id.clone(), tx_id);
            tracing::info!(%uid, amount, method = method.as_deref().unwrap_or("unspecified"), "deposit order created");
            Ok(vec![ServerEvent::DepositCreated { order_id: order.order_id, approval_url: order.approval_url, message_id }])
        }

        ClientAction::CaptureDeposit { order_id, message_id } => {
            let tx_id = *state.deposit_orders.lock().unwrap().get(&order_id).ok_or(ApiError::MalformedMessage)?;
            state.payments.capture_order(&order_id).await.map_err(|e| ApiError::PaymentProvider(e.0))?;
            let wallet = state.ledger.complete_deposit(tx_id, now_unix())?;
            persist_balance(state, &uid).await;
            Ok(vec![ServerEvent::DepositCaptured { balance: wallet.balance, message_id }])
        }

        ClientAction::CancelDeposit { order_id, message_id } => {
            let tx_id = *state.deposit_orders.lock().unwrap().get(&order_id).ok_or(ApiError::MalformedMessage)?;
            state.ledger.cancel_deposit(tx_id)?;
            state.deposit_orders.lock().unwrap().remove(&order_id);
            Ok(vec![ServerEvent::DepositCancelled { message_id }])
        }

        ClientAction::WalletWithdraw { amount, destination_email, message_id } => {
            let tx_id = state.ledger.request_withdrawal(&uid, amount, &destination_email, now_unix())?;
            persist_balance(state, &uid).await;
            let _ = state
                .db
                .record_transaction(numeric_id(&uid), "withdrawal", -amount, "pending_approval", Some(&destination_email), "withdrawal request")
                .await;
            Ok(vec![ServerEvent::WithdrawRequested { transaction_id: tx_id, message_id }])
        }

        ClientAction::GetCashTables { message_id } => Ok(vec![ServerEvent::CashTables { tables: state.tables.cash_table_summaries().await, message_id }]),

        ClientAction::JoinCashTable { table_id, buy_in, message_id } => {
            let handle = state.tables.get(&table_id).ok_or(ApiError::TableNotFound)?;
            let display = uid.clone();
            state.ledger.buy_in(&uid, buy_in, &table_id, now_unix())?;
            match handle.add_player(uid.clone(), display, buy_in as u64, None).await {
                Ok(seat) => {
                    persist_balance(state, &uid).await;
                    state.seat_user(&uid, &table_id);
                    handle.mark_connected(uid.clone(), true);
                    Ok(vec![ServerEvent::Joined { table_id, seat, message_id }])
                }
                Err(e) => {
                    let _ = state.ledger.refund_buy_in(&uid, buy_in, now_unix());
                    Err(e.into())
                }
            }
        }

        ClientAction::LeaveTable { message_id } => {
            let table_id = state.table_of(&uid).ok_or(ApiError::ActionNotAllowed)?;
            let handle = state.tables.get(&table_id).ok_or(ApiError::TableNotFound)?;
            let chips = handle.remove_player(uid.clone()).await?;
            state.ledger.cash_out(&uid, chips as i64, &table_id, now_unix())?;
            persist_balance(state, &uid).await;
            state.unseat_user(&uid);
            Ok(vec![ServerEvent::Left { message_id }])
        }

        ClientAction::CreateFriendGame { name, password, small_blind, big_blind, min_buy_in, max_buy_in, max_players, message_id } => {
            if state.db.find_private_game_by_name(&name).await?.is_some() {
                return Err(ApiError::MalformedMessage);
            }
            let table_id = format!("friend-{}", uuid::Uuid::new_v4());
            state.tables.spawn_table(&table_id, &name, max_players, small_blind, big_blind, min_buy_in, max_buy_in, Some(uid.clone()), password.clone(), true);
            state
                .db
                .create_private_game(&PrivateGameRecord {
                    table_id: table_id.clone(),
                    creator: uid.clone(),
                    name,
                    password,
                    small_blind: small_blind as i64,
                    big_blind: big_blind as i64,
                    min_buy_in: min_buy_in as i64,
                    max_buy_in: max_buy_in as i64,
                    max_seats: max_players as i64,
                    status: "waiting".to_string(),
                })
                .await?;
            Ok(vec![ServerEvent::FriendGameCreated { table_id, message_id }])
        }

        ClientAction::JoinFriendGame { name, password, buy_in, message_id } => {
            let record = state.db.find_private_game_by_name(&name).await?.ok_or(ApiError::TableNotFound)?;
            if record.status != "waiting" && record.status != "active" {
                return Err(ApiError::TableNotFound);
            }
            if record.password.is_some() && record.password != password {
                return Err(ApiError::ActionNotAllowed);
            }
            let handle = state.tables.get(&record.table_id).ok_or(ApiError::TableNotFound)?;
            state.ledger.buy_in(&uid, buy_in, &record.table_id, now_unix())?;
            match handle.add_player(uid.clone(), uid.clone(), buy_in as u64, None).await {
                Ok(seat) => {
                    persist_balance(state, &uid).await;
                    state.seat_user(&uid, &record.table_id);
                    handle.mark_connected(uid.clone(), true);
                    let _ = state.db.set_private_game_status(&record.table_id, "active").await;
                    Ok(vec![ServerEvent::Joined { table_id: record.table_id, seat, message_id }])
                }
                Err(e) => {
                    let _ = state.ledger.refund_buy_in(&uid, buy_in, now_unix());
                    Err(e.into())
                }
            }
        }

        ClientAction::GetFriendGames { message_id } => Ok(vec![ServerEvent::FriendGames { games: state.tables.friend_game_summaries().await, message_id }]),

        ClientAction::DeleteFriendGame { table_id, message_id } => {
            let games = state.db.list_private_games().await?;
            let record = games.into_iter().find(|g| g.table_id == table_id).ok_or(ApiError::TableNotFound)?;
            if record.creator != uid {
                return Err(ApiError::ActionNotAllowed);
            }
            state.tables.remove(&table_id);
            state.db.set_private_game_status(&table_id, "deleted").await?;
            Ok(vec![ServerEvent::FriendGameDeleted { message_id }])
        }

        ClientAction::Check { message_id } => act(state, &uid, Action::Check, message_id).await,
        ClientAction::Call { message_id } => act(state, &uid, Action::Call, message_id).await,
        ClientAction::Raise { amount, message_id } => act(state, &uid, Action::Raise(amount), message_id).await,
        ClientAction::Fold { message_id } => act(state, &uid, Action::Fold, message_id).await,

        ClientAction::Sitout { message_id } => {
            let table_id = state.table_of(&uid).ok_or(ApiError::ActionNotAllowed)?;
            let handle = state.tables.get(&table_id).ok_or(ApiError::TableNotFound)?;
            handle.sit_out(uid).await?;
            Ok(vec![ServerEvent::ActionOk { message_id }])
        }
        ClientAction::Sitin { message_id } => {
            let table_id = state.table_of(&uid).ok_or(ApiError::ActionNotAllowed)?;
            let handle = state.tables.get(&table_id).ok_or(ApiError::TableNotFound)?;
            handle.sit_in(uid).await?;
            Ok(vec![ServerEvent::ActionOk { message_id }])
        }

        ClientAction::GetTableState { message_id } => {
            let _ = message_id;
            let table_id = state.table_of(&uid).ok_or(ApiError::ActionNotAllowed)?;
            let handle = state.tables.get(&table_id).ok_or(ApiError::TableNotFound)?;
            let name = state.tables.name_of(&table_id).unwrap_or_default();
            let snap = handle.snapshot_for(Some(uid)).await;
            Ok(vec![ServerEvent::TableUpdate { table_state: TableStateWire::from_snapshot(&name, &snap) }])
        }

        ClientAction::ChatMessage { table_id, message, message_id } => {
            let _ = message_id;
            let handle = state.tables.get(&table_id).ok_or(ApiError::TableNotFound)?;
            let snap = handle.snapshot_for(None).await;
            let event = ServerEvent::Chat { table_id, user_id: uid, message };
            if let Ok(payload) = serde_json::to_string(&event) {
                for seat in &snap.players {
                    state.session.send_to_user(&seat.user, payload.clone());
                }
            }
            Ok(vec![])
        }
    }
}

async fn act(state: &AppState, uid: &str, action: Action, message_id: Option<String>) -> Result<Vec<ServerEvent>, ApiError> {
    let table_id = state.table_of(uid).ok_or(ApiError::ActionNotAllowed)?;
    let handle = state.tables.get(&table_id).ok_or(ApiError::TableNotFound)?;
    handle.handle_action(uid.to_string(), action).await?;
    Ok(vec![ServerEvent::ActionOk { message_id }])
}
