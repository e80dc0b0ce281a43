//! SQLite document store: one row per club/territory/profile document plus
//! an append-only battle ledger. Every operation's delta commits inside a
//! single transaction; club and territory rows carry a version column and
//! are written conditionally, so a concurrent writer surfaces as
//! `VersionConflict` instead of a lost update.

use std::fmt;
use std::path::Path;

use contracts::{BattleRecord, Club, Territory, UserProfile};
use rusqlite::{params, Connection, Transaction};
use serde::de::DeserializeOwned;
use turf_core::StateDelta;

#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    /// A conditional write found the stored version ahead of the expected
    /// one; the caller should reload and retry.
    VersionConflict(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
            Self::VersionConflict(entity) => {
                write!(f, "stale version for {entity}")
            }
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

#[derive(Debug)]
pub struct SqliteControlStore {
    conn: Connection,
}

impl SqliteControlStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    fn configure(&self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn migrate(&self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS clubs (
                club_id    TEXT PRIMARY KEY,
                version    INTEGER NOT NULL,
                doc_json   TEXT NOT NULL,
                updated_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS territories (
                territory_id TEXT PRIMARY KEY,
                version      INTEGER NOT NULL,
                doc_json     TEXT NOT NULL,
                updated_at   TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS users (
                user_id    TEXT PRIMARY KEY,
                doc_json   TEXT NOT NULL,
                updated_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS battles (
                battle_id    TEXT PRIMARY KEY,
                sequence     INTEGER NOT NULL,
                territory_id TEXT NOT NULL,
                doc_json     TEXT NOT NULL,
                created_at   TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS battles_by_territory
                ON battles (territory_id, sequence);",
        )?;
        Ok(())
    }

    pub fn is_empty(&self) -> Result<bool, PersistenceError> {
        let total: i64 = self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM clubs)
                  + (SELECT COUNT(*) FROM territories)
                  + (SELECT COUNT(*) FROM users)
                  + (SELECT COUNT(*) FROM battles)",
            [],
            |row| row.get(0),
        )?;
        Ok(total == 0)
    }

    /// Commit one operation's writes atomically. Any version mismatch rolls
    /// the whole transaction back.
    pub fn apply_delta(&mut self, delta: &StateDelta) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;
        let stamp = now_stamp();

        for club in &delta.upserted_clubs {
            let doc_json = serde_json::to_string(club)?;
            upsert_versioned(&tx, "clubs", "club_id", &club.club_id, club.version, &doc_json, &stamp)?;
        }
        for club_id in &delta.deleted_club_ids {
            tx.execute("DELETE FROM clubs WHERE club_id = ?1", params![club_id])?;
        }
        for territory in &delta.upserted_territories {
            let doc_json = serde_json::to_string(territory)?;
            upsert_versioned(
                &tx,
                "territories",
                "territory_id",
                &territory.territory_id,
                territory.version,
                &doc_json,
                &stamp,
            )?;
        }
        for profile in &delta.upserted_users {
            let doc_json = serde_json::to_string(profile)?;
            tx.execute(
                "INSERT INTO users (user_id, doc_json, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                    doc_json = excluded.doc_json,
                    updated_at = excluded.updated_at",
                params![profile.user_id, doc_json, stamp],
            )?;
        }
        for record in &delta.appended_battles {
            let doc_json = serde_json::to_string(record)?;
            tx.execute(
                "INSERT OR IGNORE INTO battles (battle_id, sequence, territory_id, doc_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.battle_id,
                    i64::try_from(record.sequence).unwrap_or(i64::MAX),
                    record.territory_id,
                    doc_json,
                    stamp,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Unconditional full write, used to seed an empty store.
    pub fn save_snapshot(
        &mut self,
        clubs: &[Club],
        territories: &[Territory],
        users: &[UserProfile],
        battles: &[BattleRecord],
    ) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;
        let stamp = now_stamp();

        for club in clubs {
            let doc_json = serde_json::to_string(club)?;
            tx.execute(
                "INSERT OR REPLACE INTO clubs (club_id, version, doc_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    club.club_id,
                    i64::try_from(club.version).unwrap_or(i64::MAX),
                    doc_json,
                    stamp
                ],
            )?;
        }
        for territory in territories {
            let doc_json = serde_json::to_string(territory)?;
            tx.execute(
                "INSERT OR REPLACE INTO territories (territory_id, version, doc_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    territory.territory_id,
                    i64::try_from(territory.version).unwrap_or(i64::MAX),
                    doc_json,
                    stamp
                ],
            )?;
        }
        for profile in users {
            let doc_json = serde_json::to_string(profile)?;
            tx.execute(
                "INSERT OR REPLACE INTO users (user_id, doc_json, updated_at) VALUES (?1, ?2, ?3)",
                params![profile.user_id, doc_json, stamp],
            )?;
        }
        for record in battles {
            let doc_json = serde_json::to_string(record)?;
            tx.execute(
                "INSERT OR IGNORE INTO battles (battle_id, sequence, territory_id, doc_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.battle_id,
                    i64::try_from(record.sequence).unwrap_or(i64::MAX),
                    record.territory_id,
                    doc_json,
                    stamp,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn load_clubs(&self) -> Result<Vec<Club>, PersistenceError> {
        self.load_docs("SELECT doc_json FROM clubs ORDER BY club_id")
    }

    pub fn load_territories(&self) -> Result<Vec<Territory>, PersistenceError> {
        self.load_docs("SELECT doc_json FROM territories ORDER BY territory_id")
    }

    pub fn load_users(&self) -> Result<Vec<UserProfile>, PersistenceError> {
        self.load_docs("SELECT doc_json FROM users ORDER BY user_id")
    }

    pub fn load_battles(&self) -> Result<Vec<BattleRecord>, PersistenceError> {
        self.load_docs("SELECT doc_json FROM battles ORDER BY sequence")
    }

    fn load_docs<T: DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>, PersistenceError> {
        let mut statement = self.conn.prepare(sql)?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
        let mut docs = Vec::new();
        for raw in rows {
            docs.push(serde_json::from_str(&raw?)?);
        }
        Ok(docs)
    }
}

/// Insert at version 1, otherwise update conditioned on the previous
/// version still being current. Zero affected rows means a writer got
/// there first.
fn upsert_versioned(
    tx: &Transaction<'_>,
    table: &str,
    key_column: &str,
    key: &str,
    version: u64,
    doc_json: &str,
    stamp: &str,
) -> Result<(), PersistenceError> {
    let version = i64::try_from(version).unwrap_or(i64::MAX);
    let changed = if version <= 1 {
        tx.execute(
            &format!(
                "INSERT OR IGNORE INTO {table} ({key_column}, version, doc_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)"
            ),
            params![key, version, doc_json, stamp],
        )?
    } else {
        tx.execute(
            &format!(
                "UPDATE {table} SET version = ?2, doc_json = ?3, updated_at = ?4
                 WHERE {key_column} = ?1 AND version = ?5"
            ),
            params![key, version, doc_json, stamp, version - 1],
        )?
    };

    if changed == 0 {
        return Err(PersistenceError::VersionConflict(key.to_string()));
    }
    Ok(())
}

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
