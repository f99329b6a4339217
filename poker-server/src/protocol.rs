//! The client wire protocol: framed JSON over the WebSocket, an
//! enumerated, exhaustively-matched action type rather than a loose
//! `{action: handler}` map, and the redacted `table_update` snapshot
//! shape the client renders.

use crate::error::ApiError;
use poker_engine::table::{Chips, PlayerView, Street, TableSnapshot};
use poker_engine::wallet::Cents;
use poker_engine::Card;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardWire {
    pub rank: String,
    pub suit: String,
    pub value: u8,
}

impl From<Card> for CardWire {
    fn from(c: Card) -> Self {
        Self {
            rank: c.rank.to_string(),
            suit: c.suit.to_string(),
            value: c.rank.value(),
        }
    }
}

fn hidden_card() -> CardWire {
    CardWire { rank: "?".to_string(), suit: "?".to_string(), value: 0 }
}

fn cards_wire(cards: &[Option<Card>]) -> Vec<CardWire> {
    cards.iter().map(|c| c.map(CardWire::from).unwrap_or_else(hidden_card)).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerWire {
    pub user_id: String,
    pub username: String,
    pub chips: Chips,
    pub position: usize,
    pub is_sitting_out: bool,
    pub current_bet: Chips,
    pub cards: Vec<CardWire>,
    pub folded: bool,
    pub all_in: bool,
    pub last_action: Option<String>,
}

impl From<&PlayerView> for PlayerWire {
    fn from(p: &PlayerView) -> Self {
        Self {
            user_id: p.user.clone(),
            username: p.display_name.clone(),
            chips: p.chips,
            position: p.seat,
            is_sitting_out: p.sitting_out,
            current_bet: p.current_bet,
            cards: cards_wire(&p.cards),
            folded: p.folded,
            all_in: p.all_in,
            last_action: p.last_action.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WinnerWire {
    pub user_id: String,
    pub amount: Chips,
    pub hand: String,
}

fn street_label(s: Street) -> &'static str {
    match s {
        Street::Waiting => "waiting",
        Street::Preflop => "preflop",
        Street::Flop => "flop",
        Street::Turn => "turn",
        Street::River => "river",
        Street::Showdown => "showdown",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableStateWire {
    pub table_id: String,
    pub name: String,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub min_buy_in: Chips,
    pub max_buy_in: Chips,
    pub max_players: usize,
    pub players: Vec<PlayerWire>,
    pub dealer_position: usize,
    pub current_player: Option<String>,
    pub pot: Chips,
    pub community_cards: Vec<CardWire>,
    pub game_phase: String,
    pub current_bet: Chips,
    pub winners: Vec<WinnerWire>,
}

impl TableStateWire {
    pub fn from_snapshot(name: &str, snap: &TableSnapshot) -> Self {
        Self {
            table_id: snap.table_id.clone(),
            name: name.to_string(),
            small_blind: snap.small_blind,
            big_blind: snap.big_blind,
            min_buy_in: snap.min_buy_in,
            max_buy_in: snap.max_buy_in,
            max_players: snap.max_seats,
            players: snap.players.iter().map(PlayerWire::from).collect(),
            dealer_position: snap.dealer_seat,
            current_player: snap
                .current_to_act
                .and_then(|seat| snap.players.iter().find(|p| p.seat == seat))
                .map(|p| p.user.clone()),
            pot: snap.pot,
            community_cards: snap.community.iter().copied().map(CardWire::from).collect(),
            game_phase: street_label(snap.street).to_string(),
            current_bet: snap.current_bet,
            winners: snap
                .winners
                .iter()
                .map(|w| WinnerWire { user_id: w.user.clone(), amount: w.amount, hand: w.category_label.clone() })
                .collect(),
        }
    }
}

/// Every request the client may send, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientAction {
    Register {
        email: String,
        username: String,
        password: String,
        security_question_index: u32,
        security_answer: String,
        message_id: Option<String>,
    },
    Login {
        email: String,
        password: String,
        message_id: Option<String>,
    },
    Ping {
        message_id: Option<String>,
    },
    GetWallet {
        message_id: Option<String>,
    },
    WalletDeposit {
        amount: Cents,
        method: Option<String>,
        message_id: Option<String>,
    },
    CaptureDeposit {
        order_id: String,
        message_id: Option<String>,
    },
    CancelDeposit {
        order_id: String,
        message_id: Option<String>,
    },
    WalletWithdraw {
        amount: Cents,
        destination_email: String,
        message_id: Option<String>,
    },
    GetCashTables {
        message_id: Option<String>,
    },
    JoinCashTable {
        table_id: String,
        buy_in: Cents,
        message_id: Option<String>,
    },
    LeaveTable {
        message_id: Option<String>,
    },
    CreateFriendGame {
        name: String,
        password: Option<String>,
        small_blind: Chips,
        big_blind: Chips,
        min_buy_in: Chips,
        max_buy_in: Chips,
        max_players: usize,
        message_id: Option<String>,
    },
    JoinFriendGame {
        name: String,
        password: Option<String>,
        buy_in: Cents,
        message_id: Option<String>,
    },
    GetFriendGames {
        message_id: Option<String>,
    },
    DeleteFriendGame {
        table_id: String,
        message_id: Option<String>,
    },
    Check {
        message_id: Option<String>,
    },
    Call {
        message_id: Option<String>,
    },
    Raise {
        amount: Chips,
        message_id: Option<String>,
    },
    Fold {
        message_id: Option<String>,
    },
    Sitout {
        message_id: Option<String>,
    },
    Sitin {
        message_id: Option<String>,
    },
    GetTableState {
        message_id: Option<String>,
    },
    ChatMessage {
        table_id: String,
        message: String,
        message_id: Option<String>,
    },
}

impl ClientAction {
    pub fn message_id(&self) -> Option<String> {
        use ClientAction::*;
        match self {
            Register { message_id, .. }
            | Login { message_id, .. }
            | Ping { message_id }
            | GetWallet { message_id }
            | WalletDeposit { message_id, .. }
            | CaptureDeposit { message_id, .. }
            | CancelDeposit { message_id, .. }
            | WalletWithdraw { message_id, .. }
            | GetCashTables { message_id }
            | JoinCashTable { message_id, .. }
            | LeaveTable { message_id }
            | CreateFriendGame { message_id, .. }
            | JoinFriendGame { message_id, .. }
            | GetFriendGames { message_id }
            | DeleteFriendGame { message_id, .. }
            | Check { message_id }
            | Call { message_id }
            | Raise { message_id, .. }
            | Fold { message_id }
            | Sitout { message_id }
            | Sitin { message_id }
            | GetTableState { message_id }
            | ChatMessage { message_id, .. } => message_id.clone(),
        }
    }

    /// Parses a raw inbound frame. An unrecognized `type` is reported as
    /// `ApiError::UnknownAction` rather than a generic parse failure, so
    /// the client gets the action name back instead of a serde message.
    pub fn parse(text: &str) -> Result<ClientAction, ApiError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(|_| ApiError::MalformedMessage)?;
        serde_json::from_value(value.clone()).map_err(|_| {
            let kind = value.get("type").and_then(|t| t.as_str()).unwrap_or("<missing>").to_string();
            ApiError::UnknownAction(kind)
        })
    }
}

/// Every push/response the server may send. A generic `success`/`error`
/// envelope would lose the compile-time guarantee that each payload
/// carries the right fields, so this stays one tagged enum per concrete
/// shape.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected,
    LoginOk {
        user_id: String,
        username: String,
        message_id: Option<String>,
    },
    RegisterOk {
        user_id: String,
        message_id: Option<String>,
    },
    Pong {
        message_id: Option<String>,
    },
    Wallet {
        balance: Cents,
        total_deposited: Cents,
        total_withdrawn: Cents,
        message_id: Option<String>,
    },
    DepositCreated {
        order_id: String,
        approval_url: String,
        message_id: Option<String>,
    },
    DepositCaptured {
        balance: Cents,
        message_id: Option<String>,
    },
    DepositCancelled {
        message_id: Option<String>,
    },
    WithdrawRequested {
        transaction_id: u64,
        message_id: Option<String>,
    },
    CashTables {
        tables: Vec<CashTableSummary>,
        message_id: Option<String>,
    },
    FriendGames {
        games: Vec<CashTableSummary>,
        message_id: Option<String>,
    },
    FriendGameCreated {
        table_id: String,
        message_id: Option<String>,
    },
    FriendGameDeleted {
        message_id: Option<String>,
    },
    Joined {
        table_id: String,
        seat: usize,
        message_id: Option<String>,
    },
    Left {
        message_id: Option<String>,
    },
    ActionOk {
        message_id: Option<String>,
    },
    TableUpdate {
        table_state: TableStateWire,
    },
    Chat {
        table_id: String,
        user_id: String,
        message: String,
    },
    Error {
        error: String,
        message_id: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CashTableSummary {
    pub table_id: String,
    pub name: String,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub min_buy_in: Chips,
    pub max_buy_in: Chips,
    pub max_players: usize,
    pub seated: usize,
}
