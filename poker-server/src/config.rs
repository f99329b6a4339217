//! Typed server configuration, loaded from (and persisted back to) a TOML
//! file. Every component that needs configuration receives an
//! `Arc<ServerConfig>` (or a clone of the mutable admin-editable slice)
//! through its constructor instead of reaching for a global.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub ws_bind: String,
    pub admin_bind: String,
    pub database_path: String,
    pub turn_timer_seconds: u64,
    pub reconnect_grace_seconds: u64,
    pub showdown_restart_seconds: u64,
    pub maintenance_mode: bool,
    /// Scheme (e.g. `myapp://`) used to build payment-provider return
    /// URLs, kept as configuration rather than a hardcoded public host.
    pub payment_return_url_scheme: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_bind: "0.0.0.0:8080".to_string(),
            admin_bind: "0.0.0.0:8081".to_string(),
            database_path: "poker.sqlite3".to_string(),
            turn_timer_seconds: 30,
            reconnect_grace_seconds: 300,
            showdown_restart_seconds: 8,
            maintenance_mode: false,
            payment_return_url_scheme: "pokerapp://payment".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(raw) => toml::from_str(&raw).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let raw = toml::to_string_pretty(self).expect("ServerConfig always serializes");
        std::fs::write(path, raw)
    }
}

/// The admin-editable slice of configuration, held behind one lock so
/// concurrent admin requests see last-write-wins semantics rather than a
/// torn read.
pub struct ConfigStore {
    path: PathBuf,
    inner: RwLock<ServerConfig>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let inner = RwLock::new(ServerConfig::load_or_default(&path));
        Self { path, inner }
    }

    pub fn get(&self) -> ServerConfig {
        self.inner.read().unwrap().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut ServerConfig)) -> ServerConfig {
        let mut guard = self.inner.write().unwrap();
        f(&mut guard);
        let _ = guard.save(&self.path);
        guard.clone()
    }
}
