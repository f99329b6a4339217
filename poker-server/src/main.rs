use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use poker_engine::Ledger;
use poker_server::admin::{self, AdminState};
use poker_server::config::{ConfigStore, ServerConfig};
use poker_server::payment::SandboxPaymentProvider;
use poker_server::persistence::Db;
use poker_server::protocol::{ClientAction, ServerEvent};
use poker_server::router::{self, AppState};
use poker_server::session::SessionRegistry;
use poker_server::tables::TableRegistry;

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn = state.session.register_connection(tx);

    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_tx.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => {
                let events = match ClientAction::parse(&text) {
                    Ok(action) => router::handle(&state, conn, action).await,
                    Err(e) => vec![ServerEvent::Error { error: e.to_string(), message_id: None }],
                };
                for event in events {
                    if let Ok(payload) = serde_json::to_string(&event) {
                        state.session.send_to(conn, payload);
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    if let Some(user) = state.session.user_for(conn) {
        if let Some(table_id) = state.seated_table(&user) {
            if let Some(handle) = state.tables.get(&table_id) {
                handle.mark_connected(user.clone(), false);
            }
            state.session.note_disconnected_at_table(&user, &table_id);
        }
    }
    state.session.disconnect(conn);
    writer.abort();
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into())).init();

    let config_path = std::env::var("POKER_CONFIG_PATH").unwrap_or_else(|_| "poker-server.toml".to_string());
    let config = Arc::new(ConfigStore::new(config_path));
    let server_config: ServerConfig = config.get();

    let db = Arc::new(Db::connect(&server_config.database_path).await.expect("failed to open database"));
    let ledger = Arc::new(Ledger::new());
    let session = Arc::new(SessionRegistry::new(Duration::from_secs(server_config.reconnect_grace_seconds)));
    let tables = Arc::new(TableRegistry::new(session.clone(), db.clone(), &server_config));
    let payments = Arc::new(SandboxPaymentProvider::new(server_config.payment_return_url_scheme.clone()));

    let app_state = Arc::new(AppState::new(db.clone(), ledger.clone(), session.clone(), tables.clone(), config.clone(), payments));

    let ws_app = Router::new().route("/ws", get(ws_handler)).with_state(app_state.clone());

    let admin_app = admin::router(AdminState { app: app_state.clone(), db: db.clone(), config: config.clone() });

    let ws_addr: SocketAddr = server_config.ws_bind.parse().expect("invalid ws_bind address");
    let admin_addr: SocketAddr = server_config.admin_bind.parse().expect("invalid admin_bind address");

    info!(%ws_addr, %admin_addr, "starting poker server");

    let ws_listener = tokio::net::TcpListener::bind(ws_addr).await.expect("failed to bind ws listener");
    let admin_listener = tokio::net::TcpListener::bind(admin_addr).await.expect("failed to bind admin listener");

    let ws_server = axum::serve(ws_listener, ws_app);
    let admin_server = axum::serve(admin_listener, admin_app);

    tokio::select! {
        res = ws_server => { if let Err(e) = res { warn!(error = %e, "ws server exited"); } }
        res = admin_server => { if let Err(e) = res { warn!(error = %e, "admin server exited"); } }
        _ = tokio::signal::ctrl_c() => { info!("shutting down on ctrl-c"); }
    }
}
