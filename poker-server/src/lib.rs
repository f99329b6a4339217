pub mod admin;
pub mod auth;
pub mod broadcaster;
pub mod config;
pub mod error;
pub mod payment;
pub mod persistence;
pub mod protocol;
pub mod router;
pub mod session;
pub mod table_actor;
pub mod tables;
