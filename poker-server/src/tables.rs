//! The set of live tables: a handful of always-on cash tables spawned at
//! startup, plus private ("friend") games created on demand. Each table
//! is a separate actor task (`table_actor`); this registry only tracks
//! which `TableHandle` answers for which table id.

use crate::config::ServerConfig;
use crate::persistence::Db;
use crate::protocol::CashTableSummary;
use crate::session::SessionRegistry;
use crate::table_actor::{self, TableHandle};
use poker_engine::table::Chips;
use poker_engine::Table;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct CashTableSpec {
    id: &'static str,
    name: &'static str,
    max_seats: usize,
    small_blind: Chips,
    big_blind: Chips,
    min_buy_in: Chips,
    max_buy_in: Chips,
}

const CASH_TABLES: &[CashTableSpec] = &[
    CashTableSpec { id: "cash-micro", name: "Micro Stakes", max_seats: 6, small_blind: 1, big_blind: 2, min_buy_in: 40, max_buy_in: 200 },
    CashTableSpec { id: "cash-low", name: "Low Stakes", max_seats: 6, small_blind: 5, big_blind: 10, min_buy_in: 200, max_buy_in: 1000 },
    CashTableSpec { id: "cash-mid", name: "Mid Stakes", max_seats: 9, small_blind: 25, big_blind: 50, min_buy_in: 1000, max_buy_in: 5000 },
];

struct Entry {
    handle: TableHandle,
    name: String,
    is_private: bool,
}

pub struct TableRegistry {
    session: Arc<SessionRegistry>,
    db: Arc<Db>,
    turn_timeout: Duration,
    restart_delay: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl TableRegistry {
    pub fn new(session: Arc<SessionRegistry>, db: Arc<Db>, config: &ServerConfig) -> Self {
        let registry = Self {
            session,
            db,
            turn_timeout: Duration::from_secs(config.turn_timer_seconds),
            restart_delay: Duration::from_secs(config.showdown_restart_seconds),
            entries: Mutex::new(HashMap::new()),
        };
        for spec in CASH_TABLES {
            registry.spawn_table(spec.id, spec.name, spec.max_seats, spec.small_blind, spec.big_blind, spec.min_buy_in, spec.max_buy_in, None, None, false);
        }
        registry
    }

    #[allow(clippy::too_many_arguments)]
    pub fn spawn_table(
        &self,
        id: &str,
        name: &str,
        max_seats: usize,
        small_blind: Chips,
        big_blind: Chips,
        min_buy_in: Chips,
        max_buy_in: Chips,
        creator: Option<String>,
        password: Option<String>,
        is_private: bool,
    ) -> TableHandle {
        let table = Table::new(id, max_seats, small_blind, big_blind, min_buy_in, max_buy_in, creator, password);
        let handle = table_actor::spawn(table, name.to_string(), self.session.clone(), self.db.clone(), self.turn_timeout, self.restart_delay);
        self.entries.lock().unwrap().insert(
            id.to_string(),
            Entry { handle: handle.clone(), name: name.to_string(), is_private },
        );
        handle
    }

    pub fn get(&self, table_id: &str) -> Option<TableHandle> {
        self.entries.lock().unwrap().get(table_id).map(|e| e.handle.clone())
    }

    pub fn name_of(&self, table_id: &str) -> Option<String> {
        self.entries.lock().unwrap().get(table_id).map(|e| e.name.clone())
    }

    pub fn remove(&self, table_id: &str) {
        self.entries.lock().unwrap().remove(table_id);
    }

    pub async fn cash_table_summaries(&self) -> Vec<CashTableSummary> {
        let handles: Vec<(String, String, TableHandle)> = {
            let entries = self.entries.lock().unwrap();
            entries
                .iter()
                .filter(|(_, e)| !e.is_private)
                .map(|(id, e)| (id.clone(), e.name.clone(), e.handle.clone()))
                .collect()
        };
        let mut summaries = Vec::with_capacity(handles.len());
        for (id, name, handle) in handles {
            let snap = handle.snapshot_for(None).await;
            summaries.push(CashTableSummary {
                table_id: id,
                name,
                small_blind: snap.small_blind,
                big_blind: snap.big_blind,
                min_buy_in: snap.min_buy_in,
                max_buy_in: snap.max_buy_in,
                max_players: snap.max_seats,
                seated: snap.players.len(),
            });
        }
        summaries
    }

    pub async fn friend_game_summaries(&self) -> Vec<CashTableSummary> {
        let handles: Vec<(String, String, TableHandle)> = {
            let entries = self.entries.lock().unwrap();
            entries
                .iter()
                .filter(|(_, e)| e.is_private)
                .map(|(id, e)| (id.clone(), e.name.clone(), e.handle.clone()))
                .collect()
        };
        let mut summaries = Vec::with_capacity(handles.len());
        for (id, name, handle) in handles {
            let snap = handle.snapshot_for(None).await;
            summaries.push(CashTableSummary {
                table_id: id,
                name,
                small_blind: snap.small_blind,
                big_blind: snap.big_blind,
                min_buy_in: snap.min_buy_in,
                max_buy_in: snap.max_buy_in,
                max_players: snap.max_seats,
                seated: snap.players.len(),
            });
        }
        summaries
    }
}
