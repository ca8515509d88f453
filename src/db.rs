use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS skills (
    id   TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS developers (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    email      TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE TABLE IF NOT EXISTS developer_skills (
    id           TEXT PRIMARY KEY,
    developer_id TEXT NOT NULL REFERENCES developers(id) ON DELETE CASCADE,
    skill_id     TEXT NOT NULL REFERENCES skills(id)
);

-- parent_task_id is deliberately not a foreign key: deleting a task removes
-- its direct children only, and grandchildren keep their dangling parent id.
CREATE TABLE IF NOT EXISTS tasks (
    id             TEXT PRIMARY KEY,
    title          TEXT NOT NULL,
    status         TEXT NOT NULL DEFAULT 'TODO' CHECK(status IN ('TODO', 'In Progress', 'Done')),
    developer_id   TEXT REFERENCES developers(id) ON DELETE SET NULL,
    parent_task_id TEXT,
    created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    updated_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE INDEX IF NOT EXISTS tasks_parent ON tasks(parent_task_id);

CREATE TABLE IF NOT EXISTS task_skills (
    id       TEXT PRIMARY KEY,
    task_id  TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    skill_id TEXT NOT NULL REFERENCES skills(id)
);

CREATE INDEX IF NOT EXISTS task_skills_task ON task_skills(task_id);
";

fn set_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

pub fn open(path: &str) -> Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("failed to open database {path}"))?;
    set_pragmas(&conn)?;
    Ok(conn)
}

pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Fresh row id for any table.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Handle to the database file, owned by the process entry point.
///
/// Every request opens its own connection through [`Db::connect`]; SQLite's
/// WAL mode and busy timeout arbitrate between concurrent writers.
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    /// Creates the parent directory if needed and makes sure the schema exists.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
        }
        let db = Self { path };
        let conn = db.connect()?;
        init(&conn)?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connect(&self) -> Result<Connection> {
        let path = self
            .path
            .to_str()
            .context("database path is not valid UTF-8")?;
        open(path)
    }
}

#[cfg(test)]
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    set_pragmas(&conn)?;
    init(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = open_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();
    }

    #[test]
    fn status_outside_enumeration_is_rejected() {
        let conn = open_memory().unwrap();
        let res = conn.execute(
            "INSERT INTO tasks (id, title, status) VALUES ('t', 'x', 'Blocked')",
            [],
        );
        assert!(res.is_err());
    }

    #[test]
    fn skill_names_are_unique() {
        let conn = open_memory().unwrap();
        conn.execute("INSERT INTO skills (id, name) VALUES ('a', 'Frontend')", [])
            .unwrap();
        assert!(conn
            .execute("INSERT INTO skills (id, name) VALUES ('b', 'Frontend')", [])
            .is_err());
    }

    #[test]
    fn create_makes_parent_dir_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tasks.db");
        let db = Db::create(&path).unwrap();
        assert!(path.exists());
        let conn = db.connect().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
