//! Integration coverage across the request router, table actors and
//! session registry together — the seams unit tests inside each module
//! can't exercise on their own.

use poker_engine::Ledger;
use poker_server::config::ConfigStore;
use poker_server::payment::SandboxPaymentProvider;
use poker_server::persistence::Db;
use poker_server::protocol::{ClientAction, ServerEvent};
use poker_server::router::{self, AppState};
use poker_server::session::SessionRegistry;
use poker_server::tables::TableRegistry;
use std::sync::Arc;
use std::time::Duration;

async fn test_state() -> Arc<AppState> {
    let db = Arc::new(Db::connect_in_memory().await.unwrap());
    let ledger = Arc::new(Ledger::new());
    let session = Arc::new(SessionRegistry::new(Duration::from_secs(300)));
    let config_file = tempfile::NamedTempFile::new().unwrap();
    let config = Arc::new(ConfigStore::new(config_file.path()));
    let server_config = config.get();
    let tables = Arc::new(TableRegistry::new(session.clone(), db.clone(), &server_config));
    let payments = Arc::new(SandboxPaymentProvider::new("pokerapp://payment"));
    Arc::new(AppState::new(db, ledger, session, tables, config, payments))
}

fn any(events: &[ServerEvent], pick: impl Fn(&ServerEvent) -> bool) -> bool {
    events.iter().any(pick)
}

async fn register(state: &AppState, conn: u64, email: &str, username: &str) -> Vec<ServerEvent> {
    router::handle(
        state,
        conn,
        ClientAction::Register {
            email: email.to_string(),
            username: username.to_string(),
            password: "hunter222".to_string(),
            security_question_index: 0,
            security_answer: "rex".to_string(),
            message_id: None,
        },
    )
    .await
}

#[tokio::test]
async fn register_then_login_then_join_cash_table() {
    let state = test_state().await;

    let events = register(&state, 1, "a@example.com", "alice").await;
    assert!(any(&events, |e| matches!(e, ServerEvent::RegisterOk { .. })));

    let join = ClientAction::JoinCashTable { table_id: "cash-micro".to_string(), buy_in: 100, message_id: None };
    let events = router::handle(&state, 1, join).await;
    assert!(any(&events, |e| matches!(e, ServerEvent::Joined { .. })), "expected Joined, got {events:?}");
}

#[tokio::test]
async fn joining_without_authentication_is_rejected() {
    let state = test_state().await;
    let join = ClientAction::JoinCashTable { table_id: "cash-micro".to_string(), buy_in: 100, message_id: None };
    let events = router::handle(&state, 1, join).await;
    assert!(matches!(events.as_slice(), [ServerEvent::Error { .. }]));
}

#[tokio::test]
async fn buy_in_over_the_wallet_balance_is_rejected() {
    let state = test_state().await;
    register(&state, 1, "b@example.com", "bob").await;

    let join = ClientAction::JoinCashTable { table_id: "cash-micro".to_string(), buy_in: 1_000_000, message_id: None };
    let events = router::handle(&state, 1, join).await;
    assert!(matches!(events.as_slice(), [ServerEvent::Error { .. }]));
}

#[tokio::test]
async fn deposit_lifecycle_through_the_router() {
    let state = test_state().await;
    register(&state, 1, "c@example.com", "carol").await;

    let events = router::handle(&state, 1, ClientAction::WalletDeposit { amount: 5000, method: None, message_id: None }).await;
    let order_id = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::DepositCreated { order_id, .. } => Some(order_id.clone()),
            _ => None,
        })
        .expect("deposit created");

    let events = router::handle(&state, 1, ClientAction::CaptureDeposit { order_id, message_id: None }).await;
    assert!(any(&events, |e| matches!(e, ServerEvent::DepositCaptured { balance, .. } if *balance == 5000)));

    let events = router::handle(&state, 1, ClientAction::GetWallet { message_id: None }).await;
    assert!(any(&events, |e| matches!(e, ServerEvent::Wallet { balance, .. } if *balance == 5000)));
}

#[tokio::test]
async fn two_players_seated_at_a_cash_table_get_a_table_update() {
    let state = test_state().await;

    for (conn, email, username) in [(1u64, "d@example.com", "dave"), (2u64, "e@example.com", "erin")] {
        register(&state, conn, email, username).await;
        let events = router::handle(&state, conn, ClientAction::JoinCashTable { table_id: "cash-micro".to_string(), buy_in: 100, message_id: None }).await;
        assert!(any(&events, |e| matches!(e, ServerEvent::Joined { .. })));
    }

    tokio::time::sleep(Duration::from_millis(50)).await;

    let events = router::handle(&state, 1, ClientAction::GetTableState { message_id: None }).await;
    assert!(any(&events, |e| matches!(e, ServerEvent::TableUpdate { .. })));
}

#[tokio::test]
async fn leaving_a_table_cashes_out_the_stack() {
    let state = test_state().await;
    register(&state, 1, "f@example.com", "frank").await;
    router::handle(&state, 1, ClientAction::JoinCashTable { table_id: "cash-micro".to_string(), buy_in: 100, message_id: None }).await;

    let events = router::handle(&state, 1, ClientAction::LeaveTable { message_id: None }).await;
    assert!(any(&events, |e| matches!(e, ServerEvent::Left { .. })));

    let after = router::handle(&state, 1, ClientAction::GetWallet { message_id: None }).await;
    let after_balance = after
        .iter()
        .find_map(|e| match e {
            ServerEvent::Wallet { balance, .. } => Some(*balance),
            _ => None,
        })
        .unwrap();
    assert_eq!(after_balance, 100);
}

#[tokio::test]
async fn create_and_join_a_friend_game() {
    let state = test_state().await;
    register(&state, 1, "g@example.com", "gina").await;
    register(&state, 2, "h@example.com", "hank").await;

    let create = ClientAction::CreateFriendGame {
        name: "gina's table".to_string(),
        password: Some("secret".to_string()),
        small_blind: 1,
        big_blind: 2,
        min_buy_in: 40,
        max_buy_in: 200,
        max_players: 6,
        message_id: None,
    };
    let events = router::handle(&state, 1, create).await;
    assert!(any(&events, |e| matches!(e, ServerEvent::FriendGameCreated { .. })));

    let wrong_password = ClientAction::JoinFriendGame { name: "gina's table".to_string(), password: Some("nope".to_string()), buy_in: 100, message_id: None };
    let events = router::handle(&state, 2, wrong_password).await;
    assert!(matches!(events.as_slice(), [ServerEvent::Error { .. }]));

    let join = ClientAction::JoinFriendGame { name: "gina's table".to_string(), password: Some("secret".to_string()), buy_in: 100, message_id: None };
    let events = router::handle(&state, 2, join).await;
    assert!(any(&events, |e| matches!(e, ServerEvent::Joined { .. })));
}
