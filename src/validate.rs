use std::collections::HashSet;

use anyhow::{bail, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::error::TaskError;
use crate::model::Status;
use crate::skills::{developer_skill_names, task_skill_names};

/// Reject blank titles: must contain something other than whitespace.
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        bail!(TaskError::Invalid("task title must not be empty".into()));
    }
    Ok(())
}

pub fn validate_developer_fields(name: &str, email: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!(TaskError::Invalid("developer name must not be empty".into()));
    }
    if !email.contains('@') {
        bail!(TaskError::Invalid(format!("'{email}' is not a valid email address")));
    }
    Ok(())
}

/// Whether `task_id` may move to `status`.
///
/// Only a move to Done is guarded, and only direct subtasks are inspected: a
/// child marked Done lets its parent close even if a grandchild is open.
pub fn can_transition_to_done(conn: &Connection, task_id: &str, status: Status) -> Result<bool> {
    if status != Status::Done {
        return Ok(true);
    }
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM tasks WHERE id = ?1", [task_id], |row| row.get(0))
        .optional()?;
    if exists.is_none() {
        return Ok(false);
    }
    let open_children: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE parent_task_id = ?1 AND status != 'Done'",
        [task_id],
        |row| row.get(0),
    )?;
    Ok(open_children == 0)
}

/// Every required skill name appears in `available` (exact match).
pub fn skills_cover<A, R>(available: &[A], required: &[R]) -> bool
where
    A: AsRef<str>,
    R: AsRef<str>,
{
    let have: HashSet<&str> = available.iter().map(AsRef::as_ref).collect();
    required.iter().all(|r| have.contains(r.as_ref()))
}

/// Whether the developer's skills are a superset of the task's required skills.
/// A missing developer or task never qualifies.
pub fn can_assign(conn: &Connection, developer_id: &str, task_id: &str) -> Result<bool> {
    if !row_exists(conn, "developers", developer_id)? || !row_exists(conn, "tasks", task_id)? {
        return Ok(false);
    }
    let have = developer_skill_names(conn, developer_id)?;
    let need = task_skill_names(conn, task_id)?;
    Ok(skills_cover(&have, &need))
}

fn row_exists(conn: &Connection, table: &str, id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE id = ?1"),
        [id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::skills::{attach_to_developer, attach_to_task, resolve};

    fn add_task(conn: &Connection, id: &str, parent: Option<&str>, status: &str) {
        conn.execute(
            "INSERT INTO tasks (id, title, status, parent_task_id) VALUES (?1, ?1, ?2, ?3)",
            rusqlite::params![id, status, parent],
        )
        .unwrap();
    }

    fn add_developer(conn: &Connection, id: &str, skills: &[&str]) {
        conn.execute(
            "INSERT INTO developers (id, name, email) VALUES (?1, ?1, ?1 || '@example.com')",
            [id],
        )
        .unwrap();
        let names: Vec<String> = skills.iter().map(|s| s.to_string()).collect();
        let ids = resolve(conn, &names).unwrap();
        attach_to_developer(conn, id, &ids).unwrap();
    }

    fn require(conn: &Connection, task: &str, skills: &[&str]) {
        let names: Vec<String> = skills.iter().map(|s| s.to_string()).collect();
        let ids = resolve(conn, &names).unwrap();
        attach_to_task(conn, task, &ids).unwrap();
    }

    #[test]
    fn titles() {
        assert!(validate_title("Build UI").is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
    }

    #[test]
    fn developer_fields() {
        assert!(validate_developer_fields("Alice", "alice@gmail.com").is_ok());
        assert!(validate_developer_fields("", "alice@gmail.com").is_err());
        assert!(validate_developer_fields("Alice", "alice").is_err());
    }

    #[test]
    fn non_done_status_always_allowed() {
        let conn = db::open_memory().unwrap();
        add_task(&conn, "p", None, "TODO");
        add_task(&conn, "c", Some("p"), "TODO");
        assert!(can_transition_to_done(&conn, "p", Status::InProgress).unwrap());
        assert!(can_transition_to_done(&conn, "p", Status::Todo).unwrap());
    }

    #[test]
    fn leaf_can_be_done() {
        let conn = db::open_memory().unwrap();
        add_task(&conn, "t", None, "TODO");
        assert!(can_transition_to_done(&conn, "t", Status::Done).unwrap());
    }

    #[test]
    fn open_child_blocks_done() {
        let conn = db::open_memory().unwrap();
        add_task(&conn, "p", None, "TODO");
        add_task(&conn, "a", Some("p"), "Done");
        add_task(&conn, "b", Some("p"), "In Progress");
        assert!(!can_transition_to_done(&conn, "p", Status::Done).unwrap());
    }

    #[test]
    fn grandchildren_are_not_inspected() {
        let conn = db::open_memory().unwrap();
        add_task(&conn, "p", None, "TODO");
        add_task(&conn, "c", Some("p"), "Done");
        add_task(&conn, "g", Some("c"), "TODO");
        assert!(can_transition_to_done(&conn, "p", Status::Done).unwrap());
    }

    #[test]
    fn missing_task_cannot_be_done() {
        let conn = db::open_memory().unwrap();
        assert!(!can_transition_to_done(&conn, "ghost", Status::Done).unwrap());
    }

    #[test]
    fn cover_is_set_containment() {
        assert!(skills_cover(&["Frontend", "Backend"], &["Backend"]));
        assert!(skills_cover(&["Frontend"], &[] as &[&str]));
        assert!(skills_cover(&[] as &[&str], &[] as &[&str]));
        assert!(!skills_cover(&["Frontend"], &["Frontend", "Backend"]));
        assert!(!skills_cover(&["frontend"], &["Frontend"]));
    }

    #[test]
    fn assign_requires_superset() {
        let conn = db::open_memory().unwrap();
        add_developer(&conn, "alice", &["Frontend", "UI/UX"]);
        add_developer(&conn, "carol", &["Frontend", "Backend"]);
        add_task(&conn, "t", None, "TODO");
        require(&conn, "t", &["Frontend", "Backend"]);
        assert!(!can_assign(&conn, "alice", "t").unwrap());
        assert!(can_assign(&conn, "carol", "t").unwrap());
    }

    #[test]
    fn task_without_requirements_accepts_anyone() {
        let conn = db::open_memory().unwrap();
        add_developer(&conn, "dave", &[]);
        add_task(&conn, "t", None, "TODO");
        assert!(can_assign(&conn, "dave", "t").unwrap());
    }

    #[test]
    fn missing_rows_fail_assignment() {
        let conn = db::open_memory().unwrap();
        add_developer(&conn, "dave", &["Backend"]);
        add_task(&conn, "t", None, "TODO");
        assert!(!can_assign(&conn, "ghost", "t").unwrap());
        assert!(!can_assign(&conn, "dave", "ghost").unwrap());
    }
}
