//! Connection <-> user mapping. A user holds at most one live
//! connection; a second successful authentication evicts the earlier
//! one. Disconnection does not remove a seated player — `table_actor`
//! flags them `sitting_out` and a reconnect within the grace window
//! rebinds the same seat.
//!
//! Held behind its own lock, never while holding a table lock.

use poker_engine::wallet::UserId;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

pub type ConnectionId = u64;

pub struct ConnectionHandle {
    pub tx: UnboundedSender<String>,
}

struct Inner {
    next_id: ConnectionId,
    conn_to_user: HashMap<ConnectionId, UserId>,
    user_to_conn: HashMap<UserId, ConnectionId>,
    handles: HashMap<ConnectionId, ConnectionHandle>,
    /// Seat a disconnected user last held, so a reconnect within the
    /// grace window knows which table to rebind to.
    last_table: HashMap<UserId, (String, Instant)>,
}

pub struct SessionRegistry {
    grace_window: Duration,
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    pub fn new(grace_window: Duration) -> Self {
        Self {
            grace_window,
            inner: Mutex::new(Inner {
                next_id: 1,
                conn_to_user: HashMap::new(),
                user_to_conn: HashMap::new(),
                handles: HashMap::new(),
                last_table: HashMap::new(),
            }),
        }
    }

    pub fn register_connection(&self, tx: UnboundedSender<String>) -> ConnectionId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handles.insert(id, ConnectionHandle { tx });
        id
    }

    /// Binds `user` to `conn`, evicting and returning any connection the
    /// user previously held (the caller should close that socket).
    pub fn bind_user(&self, conn: ConnectionId, user: UserId) -> Option<ConnectionId> {
        let mut inner = self.inner.lock().unwrap();
        let evicted = inner.user_to_conn.insert(user.clone(), conn);
        inner.conn_to_user.insert(conn, user);
        evicted.filter(|&prev| prev != conn)
    }

    pub fn user_for(&self, conn: ConnectionId) -> Option<UserId> {
        self.inner.lock().unwrap().conn_to_user.get(&conn).cloned()
    }

    pub fn connection_for(&self, user: &str) -> Option<ConnectionId> {
        self.inner.lock().unwrap().user_to_conn.get(user).copied()
    }

    pub fn send_to(&self, conn: ConnectionId, payload: String) {
        let inner = self.inner.lock().unwrap();
        if let Some(handle) = inner.handles.get(&conn) {
            let _ = handle.tx.send(payload);
        }
    }

    pub fn send_to_user(&self, user: &str, payload: String) {
        let conn = self.connection_for(user);
        if let Some(conn) = conn {
            self.send_to(conn, payload);
        }
    }

    /// Sends `payload` to every currently-registered connection, not just
    /// authenticated ones — used for operator broadcasts.
    pub fn broadcast_all(&self, payload: &str) {
        let inner = self.inner.lock().unwrap();
        for handle in inner.handles.values() {
            let _ = handle.tx.send(payload.to_string());
        }
    }

    /// Marks `user` as having just disconnected while seated at `table_id`,
    /// starting the reconnect grace window.
    pub fn note_disconnected_at_table(&self, user: &str, table_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.last_table.insert(user.to_string(), (table_id.to_string(), Instant::now()));
    }

    pub fn note_reconnected(&self, user: &str) {
        self.inner.lock().unwrap().last_table.remove(user);
    }

    /// Returns the table a user can still rebind to, if they reconnect
    /// within the configured grace window.
    pub fn rebindable_table(&self, user: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.last_table.get(user).and_then(|(table, at)| {
            (at.elapsed() < self.grace_window).then(|| table.clone())
        })
    }

    pub fn disconnect(&self, conn: ConnectionId) {
        let mut inner = self.inner.lock().unwrap();
        inner.handles.remove(&conn);
        if let Some(user) = inner.conn_to_user.remove(&conn) {
            if inner.user_to_conn.get(&user) == Some(&conn) {
                inner.user_to_conn.remove(&user);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_login_evicts_first_connection() {
        let reg = SessionRegistry::new(Duration::from_secs(300));
        let (tx1, _rx1) = tokio::sync::mpsc::unbounded_channel();
        let (tx2, _rx2) = tokio::sync::mpsc::unbounded_channel();
        let c1 = reg.register_connection(tx1);
        let c2 = reg.register_connection(tx2);
        assert_eq!(reg.bind_user(c1, "alice".to_string()), None);
        let evicted = reg.bind_user(c2, "alice".to_string());
        assert_eq!(evicted, Some(c1));
        assert_eq!(reg.connection_for("alice"), Some(c2));
    }

    #[test]
    fn rebind_window_expires() {
        let reg = SessionRegistry::new(Duration::from_millis(0));
        reg.note_disconnected_at_table("bob", "t1");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(reg.rebindable_table("bob"), None);
    }
}
