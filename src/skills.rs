//! Skill rows and the join tables that attach them to tasks and developers.
//!
//! Skills are created lazily the first time a name is referenced and are never
//! deleted. Lookup is by exact, case-sensitive name.

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::db::new_id;
use crate::model::{DeveloperSkill, Skill, TaskSkill};

/// Find-or-create a skill per name, returning ids in input order.
pub fn resolve(conn: &Connection, names: &[String]) -> Result<Vec<String>> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        conn.execute(
            "INSERT INTO skills (id, name) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
            rusqlite::params![new_id(), name],
        )?;
        let id: String = conn.query_row(
            "SELECT id FROM skills WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;
        ids.push(id);
    }
    Ok(ids)
}

pub fn attach_to_task(conn: &Connection, task_id: &str, skill_ids: &[String]) -> Result<()> {
    let mut stmt =
        conn.prepare_cached("INSERT INTO task_skills (id, task_id, skill_id) VALUES (?1, ?2, ?3)")?;
    for skill_id in skill_ids {
        stmt.execute(rusqlite::params![new_id(), task_id, skill_id])?;
    }
    Ok(())
}

/// Drop every skill link of the task, then link `names` (resolved on the fly).
pub fn replace_task_skills(conn: &Connection, task_id: &str, names: &[String]) -> Result<()> {
    conn.execute("DELETE FROM task_skills WHERE task_id = ?1", [task_id])?;
    let ids = resolve(conn, names)?;
    attach_to_task(conn, task_id, &ids)
}

pub fn attach_to_developer(conn: &Connection, developer_id: &str, skill_ids: &[String]) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO developer_skills (id, developer_id, skill_id) VALUES (?1, ?2, ?3)",
    )?;
    for skill_id in skill_ids {
        stmt.execute(rusqlite::params![new_id(), developer_id, skill_id])?;
    }
    Ok(())
}

pub fn replace_developer_skills(conn: &Connection, developer_id: &str, names: &[String]) -> Result<()> {
    conn.execute(
        "DELETE FROM developer_skills WHERE developer_id = ?1",
        [developer_id],
    )?;
    let ids = resolve(conn, names)?;
    attach_to_developer(conn, developer_id, &ids)
}

pub fn task_skills(conn: &Connection, task_id: &str) -> Result<Vec<TaskSkill>> {
    let mut stmt = conn.prepare_cached(
        "SELECT ts.id, ts.task_id, s.id, s.name
         FROM task_skills ts JOIN skills s ON s.id = ts.skill_id
         WHERE ts.task_id = ?1
         ORDER BY ts.rowid",
    )?;
    let rows = stmt.query_map([task_id], |row| {
        let skill_id: String = row.get(2)?;
        Ok(TaskSkill {
            id: row.get(0)?,
            task_id: row.get(1)?,
            skill_id: skill_id.clone(),
            skill: Skill {
                id: skill_id,
                name: row.get(3)?,
            },
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

pub fn developer_skills(conn: &Connection, developer_id: &str) -> Result<Vec<DeveloperSkill>> {
    let mut stmt = conn.prepare_cached(
        "SELECT ds.id, ds.developer_id, s.id, s.name
         FROM developer_skills ds JOIN skills s ON s.id = ds.skill_id
         WHERE ds.developer_id = ?1
         ORDER BY ds.rowid",
    )?;
    let rows = stmt.query_map([developer_id], |row| {
        let skill_id: String = row.get(2)?;
        Ok(DeveloperSkill {
            id: row.get(0)?,
            developer_id: row.get(1)?,
            skill_id: skill_id.clone(),
            skill: Skill {
                id: skill_id,
                name: row.get(3)?,
            },
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

/// Names of the skills linked to a task.
pub fn task_skill_names(conn: &Connection, task_id: &str) -> Result<Vec<String>> {
    Ok(task_skills(conn, task_id)?
        .into_iter()
        .map(|ts| ts.skill.name)
        .collect())
}

pub fn developer_skill_names(conn: &Connection, developer_id: &str) -> Result<Vec<String>> {
    Ok(developer_skills(conn, developer_id)?
        .into_iter()
        .map(|ds| ds.skill.name)
        .collect())
}

pub fn list_skills(conn: &Connection) -> Result<Vec<Skill>> {
    let mut stmt = conn.prepare("SELECT id, name FROM skills ORDER BY rowid")?;
    let rows = stmt.query_map([], |row| {
        Ok(Skill {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

pub fn find_skill(conn: &Connection, id: &str) -> Result<Option<Skill>> {
    conn.query_row("SELECT id, name FROM skills WHERE id = ?1", [id], |row| {
        Ok(Skill {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })
    .optional()
    .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn insert_task(conn: &Connection, id: &str) {
        conn.execute(
            "INSERT INTO tasks (id, title) VALUES (?1, 'task')",
            [id],
        )
        .unwrap();
    }

    #[test]
    fn resolve_creates_missing_and_reuses_existing() {
        let conn = db::open_memory().unwrap();
        let first = resolve(&conn, &names(&["Frontend", "Backend"])).unwrap();
        let second = resolve(&conn, &names(&["Backend", "Database"])).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1], second[0]);
        assert_ne!(second[0], second[1]);
        assert_eq!(list_skills(&conn).unwrap().len(), 3);
    }

    #[test]
    fn resolve_is_case_sensitive() {
        let conn = db::open_memory().unwrap();
        let ids = resolve(&conn, &names(&["backend", "Backend"])).unwrap();
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn duplicate_names_in_one_call_share_an_id() {
        let conn = db::open_memory().unwrap();
        let ids = resolve(&conn, &names(&["Testing", "Testing"])).unwrap();
        assert_eq!(ids[0], ids[1]);
        assert_eq!(list_skills(&conn).unwrap().len(), 1);
    }

    #[test]
    fn replace_task_skills_drops_old_links() {
        let conn = db::open_memory().unwrap();
        insert_task(&conn, "t");
        let ids = resolve(&conn, &names(&["Frontend"])).unwrap();
        attach_to_task(&conn, "t", &ids).unwrap();

        replace_task_skills(&conn, "t", &names(&["Backend", "Database"])).unwrap();
        assert_eq!(task_skill_names(&conn, "t").unwrap(), vec!["Backend", "Database"]);

        replace_task_skills(&conn, "t", &[]).unwrap();
        assert!(task_skill_names(&conn, "t").unwrap().is_empty());
        // The skill itself survives.
        assert_eq!(list_skills(&conn).unwrap().len(), 3);
    }

    #[test]
    fn find_skill_missing_is_none() {
        let conn = db::open_memory().unwrap();
        assert!(find_skill(&conn, "nope").unwrap().is_none());
    }
}
