//! Durable storage: `sqlx` against SQLite. One connection pool, one
//! transaction per composite operation (registration opens a wallet row
//! in the same transaction that inserts the user).

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub security_question_index: i64,
    pub security_answer_hash: String,
    pub suspended: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PrivateGameRecord {
    pub table_id: String,
    pub creator: String,
    pub name: String,
    pub password: Option<String>,
    pub small_blind: i64,
    pub big_blind: i64,
    pub min_buy_in: i64,
    pub max_buy_in: i64,
    pub max_seats: i64,
    pub status: String,
}

pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub async fn connect(path: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(8).connect_with(options).await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    #[cfg(test)]
    pub async fn connect_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                security_question_index INTEGER NOT NULL,
                security_answer_hash TEXT NOT NULL,
                suspended INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS wallets (
                user_id INTEGER PRIMARY KEY REFERENCES users(id),
                balance INTEGER NOT NULL DEFAULT 0,
                total_deposited INTEGER NOT NULL DEFAULT 0,
                total_withdrawn INTEGER NOT NULL DEFAULT 0
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                kind TEXT NOT NULL,
                amount INTEGER NOT NULL,
                status TEXT NOT NULL,
                external_ref TEXT,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL,
                completed_at TEXT
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS statistics (
                user_id INTEGER PRIMARY KEY REFERENCES users(id),
                hands_played INTEGER NOT NULL DEFAULT 0,
                hands_won INTEGER NOT NULL DEFAULT 0,
                biggest_pot INTEGER NOT NULL DEFAULT 0
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS game_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                table_id TEXT NOT NULL,
                pot INTEGER NOT NULL,
                winners_json TEXT NOT NULL,
                played_at TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS friends (
                user_id INTEGER NOT NULL REFERENCES users(id),
                friend_id INTEGER NOT NULL REFERENCES users(id),
                PRIMARY KEY (user_id, friend_id)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS private_games (
                table_id TEXT PRIMARY KEY,
                creator TEXT NOT NULL,
                name TEXT NOT NULL UNIQUE,
                password TEXT,
                small_blind INTEGER NOT NULL,
                big_blind INTEGER NOT NULL,
                min_buy_in INTEGER NOT NULL,
                max_buy_in INTEGER NOT NULL,
                max_seats INTEGER NOT NULL,
                status TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        security_question_index: i64,
        security_answer_hash: &str,
    ) -> Result<UserRecord, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO users (email, username, password_hash, security_question_index, security_answer_hash, suspended, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .bind(security_question_index)
        .bind(security_answer_hash)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query("INSERT INTO wallets (user_id, balance, total_deposited, total_withdrawn) VALUES (?, 0, 0, 0)")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO statistics (user_id, hands_played, hands_won, biggest_pot) VALUES (?, 0, 0, 0)")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(UserRecord {
            id,
            email: email.to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            security_question_index,
            security_answer_hash: security_answer_hash.to_string(),
            suspended: false,
            created_at: now,
        })
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn email_in_use(&self, email: &str) -> Result<bool, sqlx::Error> {
        Ok(self.find_user_by_email(email).await?.is_some())
    }

    pub async fn username_in_use(&self, username: &str) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM users WHERE username = ?").bind(username).fetch_optional(&self.pool).await?;
        Ok(row.is_some())
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users ORDER BY id").fetch_all(&self.pool).await
    }

    pub async fn record_transaction(
        &self,
        user_id: i64,
        kind: &str,
        amount: i64,
        status: &str,
        external_ref: Option<&str>,
        description: &str,
    ) -> Result<i64, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let completed_at = (status == "completed").then(|| now.clone());
        let id = sqlx::query(
            "INSERT INTO transactions (user_id, kind, amount, status, external_ref, description, created_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(kind)
        .bind(amount)
        .bind(status)
        .bind(external_ref)
        .bind(description)
        .bind(&now)
        .bind(completed_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn persist_wallet_balance(&self, user_id: i64, balance: i64, total_deposited: i64, total_withdrawn: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE wallets SET balance = ?, total_deposited = ?, total_withdrawn = ? WHERE user_id = ?")
            .bind(balance)
            .bind(total_deposited)
            .bind(total_withdrawn)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_hand(&self, table_id: &str, pot: i64, winners_json: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO game_history (table_id, pot, winners_json, played_at) VALUES (?, ?, ?, ?)")
            .bind(table_id)
            .bind(pot)
            .bind(winners_json)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn create_private_game(&self, game: &PrivateGameRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO private_games (table_id, creator, name, password, small_blind, big_blind, min_buy_in, max_buy_in, max_seats, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&game.table_id)
        .bind(&game.creator)
        .bind(&game.name)
        .bind(&game.password)
        .bind(game.small_blind)
        .bind(game.big_blind)
        .bind(game.min_buy_in)
        .bind(game.max_buy_in)
        .bind(game.max_seats)
        .bind(&game.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_private_games(&self) -> Result<Vec<PrivateGameRecord>, sqlx::Error> {
        sqlx::query_as::<_, PrivateGameRecord>("SELECT * FROM private_games WHERE status IN ('waiting', 'active')")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn find_private_game_by_name(&self, name: &str) -> Result<Option<PrivateGameRecord>, sqlx::Error> {
        sqlx::query_as::<_, PrivateGameRecord>("SELECT * FROM private_games WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn set_private_game_status(&self, table_id: &str, status: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE private_games SET status = ? WHERE table_id = ?")
            .bind(status)
            .bind(table_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_user_suspended(&self, user_id: i64, suspended: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET suspended = ? WHERE id = ?")
            .bind(suspended)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_pending_withdrawals(&self) -> Result<Vec<(i64, i64, i64)>, sqlx::Error> {
        let rows = sqlx::query("SELECT id, user_id, amount FROM transactions WHERE kind = 'withdrawal' AND status = 'pending_approval'")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| (r.get(0), r.get(1), r.get(2))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_user_also_opens_a_wallet_row() {
        let db = Db::connect_in_memory().await.unwrap();
        let user = db.create_user("a@example.com", "alice", "hash", 0, "answerhash").await.unwrap();
        assert!(db.email_in_use("a@example.com").await.unwrap());
        assert!(db.username_in_use("alice").await.unwrap());
        assert!(user.id > 0);
    }

    #[tokio::test]
    async fn private_game_round_trips_through_storage() {
        let db = Db::connect_in_memory().await.unwrap();
        let game = PrivateGameRecord {
            table_id: "t1".to_string(),
            creator: "alice".to_string(),
            name: "alice's table".to_string(),
            password: None,
            small_blind: 1,
            big_blind: 2,
            min_buy_in: 40,
            max_buy_in: 200,
            max_seats: 6,
            status: "waiting".to_string(),
        };
        db.create_private_game(&game).await.unwrap();
        let found = db.find_private_game_by_name("alice's table").await.unwrap().unwrap();
        assert_eq!(found.table_id, "t1");
        let listed = db.list_private_games().await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
