//! SQLite persistence layer.
//!
//! Stores projects and the exchange log of each project's conversation.
//! Uses WAL mode for concurrent reads during writes.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Project name is required")]
    EmptyName,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub status: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredMessage {
    pub id: i64,
    pub project_id: i64,
    pub speaker: String,
    pub content: String,
    pub created_at: i64,
}

/// Database handle wrapping a SQLite connection.
pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = Self {
            conn: Connection::open(path)?,
        };
        db.init()?;
        Ok(db)
    }

    pub fn open_memory() -> StoreResult<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> StoreResult<()> {
        self.conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        self.conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS projects (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status      TEXT NOT NULL DEFAULT 'active',
                created_at  INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id  INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                speaker     TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_project
                ON messages(project_id, id);
            ",
        )?;
        Ok(())
    }

    // ── Projects ─────────────────────────────────────────────────────

    pub fn create_project(
        &self,
        name: &str,
        description: &str,
        status: Option<&str>,
    ) -> StoreResult<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        let status = status.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("active");
        let created_at = chrono::Utc::now().timestamp();
        self.conn.execute(
            "INSERT INTO projects (name, description, status, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, description, status, created_at],
        )?;
        Ok(Project {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            description: description.to_string(),
            status: status.to_string(),
            created_at,
        })
    }

    pub fn get_project(&self, id: i64) -> StoreResult<Option<Project>> {
        let project = self
            .conn
            .query_row(
                "SELECT id, name, description, status, created_at FROM projects WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Project {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        status: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(project)
    }

    pub fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description, status, created_at FROM projects ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                status: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ── Messages ─────────────────────────────────────────────────────

    pub fn insert_message(&self, project_id: i64, speaker: &str, content: &str) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO messages (project_id, speaker, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![project_id, speaker, content, chrono::Utc::now().timestamp()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// The latest `limit` messages of a project, oldest first.
    pub fn get_messages(&self, project_id: i64, limit: usize) -> StoreResult<Vec<StoredMessage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, speaker, content, created_at FROM (
                SELECT * FROM messages WHERE project_id = ?1 ORDER BY id DESC LIMIT ?2
            ) ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![project_id, limit as i64], |row| {
            Ok(StoredMessage {
                id: row.get(0)?,
                project_id: row.get(1)?,
                speaker: row.get(2)?,
                content: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
