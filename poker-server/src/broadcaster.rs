//! Per-recipient state redaction and fan-out. One `table_update` per
//! seated viewer, computed from that viewer's own snapshot. Send
//! failures are swallowed; the session registry's disconnect path is
//! what actually cleans up a dead connection.

use crate::protocol::{ServerEvent, TableStateWire};
use crate::session::SessionRegistry;
use poker_engine::Table;

pub struct Broadcaster<'a> {
    session: &'a SessionRegistry,
}

impl<'a> Broadcaster<'a> {
    pub fn new(session: &'a SessionRegistry) -> Self {
        Self { session }
    }

    /// Emits one `table_update` per currently-seated user. Snapshots for
    /// the same table are produced and sent in this call's order, which
    /// is sufficient per-table serialization since the caller always
    /// runs this under the table's own lock.
    pub fn broadcast(&self, table_name: &str, table: &Table) {
        let public_snapshot = table.snapshot_for(None);
        for seat in &public_snapshot.players {
            let viewer_snapshot = table.snapshot_for(Some(&seat.user));
            let wire = TableStateWire::from_snapshot(table_name, &viewer_snapshot);
            let event = ServerEvent::TableUpdate { table_state: wire };
            if let Ok(payload) = serde_json::to_string(&event) {
                self.session.send_to_user(&seat.user, payload);
            }
        }
    }
}
