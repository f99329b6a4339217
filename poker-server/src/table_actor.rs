//! One task per table: the hand engine is not reentrant, so every public
//! operation on a `Table` effectively acquires that table's exclusive
//! lock by going through this actor. A single task owns the `Table`, all
//! mutation arrives as a message, and a periodic tick drives both the
//! turn timer and the post-showdown restart delay. Callers round-trip
//! through a oneshot reply instead of sharing a giant action enum with
//! the wire protocol, since each command has its own natural result
//! type.

use crate::broadcaster::Broadcaster;
use crate::persistence::Db;
use crate::session::SessionRegistry;
use poker_engine::table::{Action, Chips, Street, TableSnapshot};
use poker_engine::wallet::UserId;
use poker_engine::{Table, TableError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::warn;

type Reply<T> = oneshot::Sender<T>;

pub enum ActorCommand {
    AddPlayer { user: UserId, display: String, amount: Chips, seat: Option<usize>, reply: Reply<Result<usize, TableError>> },
    RemovePlayer { user: UserId, reply: Reply<Result<Chips, TableError>> },
    HandleAction { user: UserId, action: Action, reply: Reply<Result<(), TableError>> },
    SitOut { user: UserId, reply: Reply<Result<(), TableError>> },
    SitIn { user: UserId, reply: Reply<Result<(), TableError>> },
    MarkConnected { user: UserId, connected: bool },
    Snapshot { viewer: Option<UserId>, reply: Reply<TableSnapshot> },
    Tick,
}

#[derive(Clone)]
pub struct TableHandle {
    pub table_id: String,
    tx: mpsc::UnboundedSender<ActorCommand>,
}

impl TableHandle {
    pub async fn add_player(&self, user: UserId, display: String, amount: Chips, seat: Option<usize>) -> Result<usize, TableError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(ActorCommand::AddPlayer { user, display, amount, seat, reply });
        rx.await.unwrap_or(Err(TableError::TableFull))
    }

    pub async fn remove_player(&self, user: UserId) -> Result<Chips, TableError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(ActorCommand::RemovePlayer { user, reply });
        rx.await.unwrap_or(Err(TableError::PlayerNotFound))
    }

    pub async fn handle_action(&self, user: UserId, action: Action) -> Result<(), TableError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(ActorCommand::HandleAction { user, action, reply });
        rx.await.unwrap_or(Err(TableError::InvalidAction))
    }

    pub async fn sit_out(&self, user: UserId) -> Result<(), TableError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(ActorCommand::SitOut { user, reply });
        rx.await.unwrap_or(Err(TableError::PlayerNotFound))
    }

    pub async fn sit_in(&self, user: UserId) -> Result<(), TableError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(ActorCommand::SitIn { user, reply });
        rx.await.unwrap_or(Err(TableError::PlayerNotFound))
    }

    pub fn mark_connected(&self, user: UserId, connected: bool) {
        let _ = self.tx.send(ActorCommand::MarkConnected { user, connected });
    }

    pub async fn snapshot_for(&self, viewer: Option<UserId>) -> TableSnapshot {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(ActorCommand::Snapshot { viewer, reply });
        rx.await.expect("table actor task is alive for the table's lifetime")
    }
}

struct TableActor {
    name: String,
    table: Table,
    rx: mpsc::UnboundedReceiver<ActorCommand>,
    session: Arc<SessionRegistry>,
    db: Arc<Db>,
    turn_timeout: Duration,
    restart_delay: Duration,
    timer_deadline: Option<(Instant, u64)>,
    showdown_deadline: Option<Instant>,
    recorded_this_showdown: bool,
}

pub fn spawn(
    table: Table,
    name: String,
    session: Arc<SessionRegistry>,
    db: Arc<Db>,
    turn_timeout: Duration,
    restart_delay: Duration,
) -> TableHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let table_id = table.id.clone();
    let mut actor = TableActor {
        name,
        table,
        rx,
        session,
        db,
        turn_timeout,
        restart_delay,
        timer_deadline: None,
        showdown_deadline: None,
        recorded_this_showdown: false,
    };

    let ticker_tx = tx.clone();
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_millis(200));
        loop {
            interval.tick().await;
            if ticker_tx.send(ActorCommand::Tick).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        actor.rearm_timer();
        while let Some(cmd) = actor.rx.recv().await {
            actor.handle(cmd);
        }
    });

    TableHandle { table_id, tx }
}

impl TableActor {
    fn handle(&mut self, cmd: ActorCommand) {
        match cmd {
            ActorCommand::AddPlayer { user, display, amount, seat, reply } => {
                let result = self.table.add_player(user, display, amount, seat);
                self.rearm_timer();
                self.after_mutation();
                let _ = reply.send(result);
            }
            ActorCommand::RemovePlayer { user, reply } => {
                let result = self.table.remove_player(&user);
                self.rearm_timer();
                self.after_mutation();
                let _ = reply.send(result);
            }
            ActorCommand::HandleAction { user, action, reply } => {
                let result = self.table.handle_action(&user, action);
                self.rearm_timer();
                self.after_mutation();
                let _ = reply.send(result);
            }
            ActorCommand::SitOut { user, reply } => {
                let result = self.table.sit_out(&user);
                self.rearm_timer();
                self.after_mutation();
                let _ = reply.send(result);
            }
            ActorCommand::SitIn { user, reply } => {
                let result = self.table.sit_in(&user);
                if self.table.can_start_hand() {
                    let _ = self.table.start_hand();
                }
                self.rearm_timer();
                self.after_mutation();
                let _ = reply.send(result);
            }
            ActorCommand::MarkConnected { user, connected } => {
                let _ = self.table.mark_connected(&user, connected);
                self.after_mutation();
            }
            ActorCommand::Snapshot { viewer, reply } => {
                let _ = reply.send(self.table.snapshot_for(viewer.as_deref()));
            }
            ActorCommand::Tick => self.on_tick(),
        }
    }

    fn on_tick(&mut self) {
        let live = !matches!(self.table.street(), Street::Waiting | Street::Showdown);
        if live {
            if let Some((deadline, token)) = self.timer_deadline {
                if Instant::now() >= deadline && token == self.table.turn_token {
                    if let Some(user) = self.table.current_to_act_user().cloned() {
                        warn!(table = %self.table.id, %user, "turn timer expired, forcing action");
                        let _ = self.table.force_timeout(&user);
                    }
                }
            }
        }

        if self.table.street() == Street::Showdown {
            match self.showdown_deadline {
                None => self.showdown_deadline = Some(Instant::now() + self.restart_delay),
                Some(deadline) if Instant::now() >= deadline => {
                    self.showdown_deadline = None;
                    let _ = self.table.start_hand();
                    self.recorded_this_showdown = false;
                }
                Some(_) => {}
            }
        } else {
            self.showdown_deadline = None;
        }

        self.rearm_timer();
        self.after_mutation();
    }

    fn rearm_timer(&mut self) {
        if matches!(self.table.street(), Street::Waiting | Street::Showdown) {
            self.timer_deadline = None;
        } else {
            self.timer_deadline = Some((Instant::now() + self.turn_timeout, self.table.turn_token));
        }
    }

    fn after_mutation(&mut self) {
        if self.table.street() == Street::Showdown && !self.recorded_this_showdown {
            self.recorded_this_showdown = true;
            let snap = self.table.snapshot_for(None);
            let db = self.db.clone();
            let table_id = self.table.id.clone();
            let pot: Chips = snap.winners.iter().map(|w| w.amount).sum();
            if let Ok(winners_json) = serde_json::to_string(&snap.winners) {
                tokio::spawn(async move {
                    if let Err(e) = db.record_hand(&table_id, pot as i64, &winners_json).await {
                        tracing::error!(%table_id, error = %e, "failed to record hand history");
                    }
                });
            }
        }
        Broadcaster::new(&self.session).broadcast(&self.name, &self.table);
    }
}
