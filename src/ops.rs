use anyhow::{bail, Result};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Deserializer};

use crate::db::new_id;
use crate::error::{TaskError, DONE_TASK_DELETE, INCOMPLETE_SUBTASKS, SKILL_MISMATCH};
use crate::model::{
    AssignedTask, Developer, DeveloperView, SkillTask, SkillView, Status, Task, TaskView,
};
use crate::skills;
use crate::validate::{can_assign, can_transition_to_done, validate_developer_fields};

/// Nested subtask levels included when a task is read back.
pub const VIEW_DEPTH: usize = 2;

const TASK_COLUMNS: &str =
    "id, title, status, developer_id, parent_task_id, created_at, updated_at";

const DEVELOPER_COLUMNS: &str = "id, name, email, created_at, updated_at";

const TOUCH: &str = "updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')";

fn read_task_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        status: row.get(2)?,
        developer_id: row.get(3)?,
        parent_task_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn read_developer_row(row: &rusqlite::Row) -> rusqlite::Result<Developer> {
    Ok(Developer {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Accepts an explicit `null` as `Some(None)`, distinct from an absent field.
fn nullable<'de, D, T>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

pub fn find_task(conn: &Connection, id: &str) -> Result<Option<Task>> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        [id],
        read_task_row,
    )
    .optional()
    .map_err(Into::into)
}

pub fn require_task(conn: &Connection, id: &str) -> Result<Task> {
    find_task(conn, id)?.ok_or_else(|| TaskError::NotFound("Task").into())
}

/// Direct children of a task, in creation order.
pub fn children(conn: &Connection, id: &str) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE parent_task_id = ?1 ORDER BY rowid"
    ))?;
    let rows = stmt.query_map([id], read_task_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

pub fn find_developer(conn: &Connection, id: &str) -> Result<Option<Developer>> {
    conn.query_row(
        &format!("SELECT {DEVELOPER_COLUMNS} FROM developers WHERE id = ?1"),
        [id],
        read_developer_row,
    )
    .optional()
    .map_err(Into::into)
}

/// Attach skills and assignee to `task`, loading `depth` levels of subtasks.
/// At depth zero the `subtasks` field is left unloaded.
pub fn task_view(conn: &Connection, task: Task, depth: usize) -> Result<TaskView> {
    let skills = skills::task_skills(conn, &task.id)?;
    let developer = match task.developer_id.as_deref() {
        Some(dev) => find_developer(conn, dev)?,
        None => None,
    };
    let subtasks = if depth > 0 {
        let mut nested = Vec::new();
        for child in children(conn, &task.id)? {
            nested.push(task_view(conn, child, depth - 1)?);
        }
        Some(nested)
    } else {
        None
    };
    Ok(TaskView {
        task,
        skills,
        developer,
        subtasks,
    })
}

pub fn get_task(conn: &Connection, id: &str) -> Result<TaskView> {
    let task = require_task(conn, id)?;
    task_view(conn, task, VIEW_DEPTH)
}

/// Every task without a parent, each with two levels of subtasks.
pub fn list_root_tasks(conn: &Connection) -> Result<Vec<TaskView>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE parent_task_id IS NULL ORDER BY rowid"
    ))?;
    let roots = stmt
        .query_map([], read_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    roots
        .into_iter()
        .map(|t| task_view(conn, t, VIEW_DEPTH))
        .collect()
}

/// Scalar changes to a single task.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub status: Option<Status>,
    /// Absent: keep. `null`: unassign. Id: assign after the skill check.
    #[serde(default, deserialize_with = "nullable")]
    pub developer_id: Option<Option<String>>,
}

/// Apply title/status/assignee changes after both guards pass.
///
/// Nothing is written when a guard rejects the request.
pub fn update_task(conn: &Connection, id: &str, update: &TaskUpdate) -> Result<TaskView> {
    require_task(conn, id)?;

    if let Some(status) = update.status {
        if !can_transition_to_done(conn, id, status)? {
            bail!(TaskError::Rule(INCOMPLETE_SUBTASKS));
        }
    }

    let assignee = match &update.developer_id {
        Some(Some(dev)) if !dev.is_empty() => {
            if !can_assign(conn, dev, id)? {
                bail!(TaskError::Rule(SKILL_MISMATCH));
            }
            Some(Some(dev.as_str()))
        }
        Some(_) => Some(None),
        None => None,
    };

    apply_scalars(conn, id, update.title.as_deref(), update.status)?;
    if let Some(dev) = assignee {
        conn.execute(
            &format!("UPDATE tasks SET developer_id = ?1, {TOUCH} WHERE id = ?2"),
            rusqlite::params![dev, id],
        )?;
    }

    let task = require_task(conn, id)?;
    task_view(conn, task, 1)
}

/// Set title (when non-empty) and status (when given). Fails if `id` is unknown.
pub(crate) fn apply_scalars(
    conn: &Connection,
    id: &str,
    title: Option<&str>,
    status: Option<Status>,
) -> Result<()> {
    let title = title.filter(|t| !t.is_empty());
    let changed = conn.execute(
        &format!(
            "UPDATE tasks SET title = COALESCE(?1, title), status = COALESCE(?2, status), {TOUCH} \
             WHERE id = ?3"
        ),
        rusqlite::params![title, status, id],
    )?;
    if changed == 0 {
        bail!(TaskError::NotFound("Task"));
    }
    Ok(())
}

/// Delete a task and its direct children. Grandchildren are left in place.
pub fn delete_task(conn: &Connection, id: &str) -> Result<()> {
    let task = require_task(conn, id)?;
    if task.status == Status::Done {
        bail!(TaskError::Rule(DONE_TASK_DELETE));
    }
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute("DELETE FROM tasks WHERE parent_task_id = ?1", [id])?;
    if removed > 0 {
        log::info!("deleted {removed} subtask(s) of task {id}");
    }
    tx.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
    tx.commit()?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct NewDeveloper {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub skills: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeveloperUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Present: replaces every skill of the developer.
    pub skills: Option<Vec<String>>,
}

fn email_taken(conn: &Connection, email: &str, except: Option<&str>) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM developers WHERE email = ?1 AND id IS NOT ?2",
        rusqlite::params![email, except],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn developer_view(conn: &Connection, developer: Developer) -> Result<DeveloperView> {
    let skills = skills::developer_skills(conn, &developer.id)?;
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE developer_id = ?1 ORDER BY rowid"
    ))?;
    let assigned = stmt
        .query_map([&developer.id], read_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let mut tasks = Vec::with_capacity(assigned.len());
    for task in assigned {
        let skills = skills::task_skills(conn, &task.id)?;
        tasks.push(AssignedTask { task, skills });
    }
    Ok(DeveloperView {
        developer,
        skills,
        tasks,
    })
}

pub fn list_developers(conn: &Connection) -> Result<Vec<DeveloperView>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DEVELOPER_COLUMNS} FROM developers ORDER BY rowid"
    ))?;
    let developers = stmt
        .query_map([], read_developer_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    developers
        .into_iter()
        .map(|d| developer_view(conn, d))
        .collect()
}

pub fn get_developer(conn: &Connection, id: &str) -> Result<DeveloperView> {
    let developer = find_developer(conn, id)?.ok_or(TaskError::NotFound("Developer"))?;
    developer_view(conn, developer)
}

pub fn find_developer_by_email(conn: &Connection, email: &str) -> Result<Option<Developer>> {
    conn.query_row(
        &format!("SELECT {DEVELOPER_COLUMNS} FROM developers WHERE email = ?1"),
        [email],
        read_developer_row,
    )
    .optional()
    .map_err(Into::into)
}

pub fn create_developer(conn: &Connection, new: &NewDeveloper) -> Result<DeveloperView> {
    validate_developer_fields(&new.name, &new.email)?;
    if email_taken(conn, &new.email, None)? {
        bail!(TaskError::Invalid(format!(
            "a developer with email '{}' already exists",
            new.email
        )));
    }
    let id = new_id();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO developers (id, name, email) VALUES (?1, ?2, ?3)",
        rusqlite::params![id, new.name, new.email],
    )?;
    if let Some(names) = &new.skills {
        let ids = skills::resolve(&tx, names)?;
        skills::attach_to_developer(&tx, &id, &ids)?;
    }
    tx.commit()?;
    get_developer(conn, &id)
}

pub fn update_developer(conn: &Connection, id: &str, update: &DeveloperUpdate) -> Result<DeveloperView> {
    let current = find_developer(conn, id)?.ok_or(TaskError::NotFound("Developer"))?;
    let name = update
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or(&current.name);
    let email = update
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .unwrap_or(&current.email);
    validate_developer_fields(name, email)?;
    if email_taken(conn, email, Some(id))? {
        bail!(TaskError::Invalid(format!(
            "a developer with email '{email}' already exists"
        )));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        &format!("UPDATE developers SET name = ?1, email = ?2, {TOUCH} WHERE id = ?3"),
        rusqlite::params![name, email, id],
    )?;
    if let Some(names) = &update.skills {
        skills::replace_developer_skills(&tx, id, names)?;
    }
    tx.commit()?;
    get_developer(conn, id)
}

fn skill_view(conn: &Connection, skill: crate::model::Skill) -> Result<SkillView> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT ts.id, ts.task_id, ts.skill_id, {} \
         FROM task_skills ts JOIN tasks t ON t.id = ts.task_id \
         WHERE ts.skill_id = ?1 ORDER BY ts.rowid",
        TASK_COLUMNS
            .split(", ")
            .map(|c| format!("t.{c}"))
            .collect::<Vec<_>>()
            .join(", ")
    ))?;
    let tasks = stmt
        .query_map([&skill.id], |row| {
            Ok(SkillTask {
                id: row.get(0)?,
                task_id: row.get(1)?,
                skill_id: row.get(2)?,
                task: Task {
                    id: row.get(3)?,
                    title: row.get(4)?,
                    status: row.get(5)?,
                    developer_id: row.get(6)?,
                    parent_task_id: row.get(7)?,
                    created_at: row.get(8)?,
                    updated_at: row.get(9)?,
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(SkillView { skill, tasks })
}

pub fn list_skills(conn: &Connection) -> Result<Vec<SkillView>> {
    skills::list_skills(conn)?
        .into_iter()
        .map(|s| skill_view(conn, s))
        .collect()
}

pub fn get_skill(conn: &Connection, id: &str) -> Result<SkillView> {
    let skill = skills::find_skill(conn, id)?.ok_or(TaskError::NotFound("Skill"))?;
    skill_view(conn, skill)
}

pub const SEED_SKILLS: [&str; 8] = [
    "Frontend", "Backend", "Database", "DevOps", "UI/UX", "Testing", "Mobile", "AI/ML",
];

const SEED_DEVELOPERS: [(&str, &str, &[&str]); 4] = [
    ("Alice", "alice@gmail.com", &["Frontend", "UI/UX"]),
    ("Bob", "bob@gmail.com", &["Backend", "Database"]),
    ("Carol", "carol@gmail.com", &["Frontend", "Backend"]),
    ("Dave", "dave@gmail.com", &["Backend"]),
];

/// Load the canonical skills and sample developers. Developers whose email is
/// already present are skipped, so running it twice is harmless.
pub fn seed(conn: &Connection) -> Result<usize> {
    let names: Vec<String> = SEED_SKILLS.iter().map(|s| s.to_string()).collect();
    skills::resolve(conn, &names)?;
    let mut created = 0;
    for (name, email, skill_names) in SEED_DEVELOPERS {
        if find_developer_by_email(conn, email)?.is_some() {
            continue;
        }
        create_developer(
            conn,
            &NewDeveloper {
                name: name.to_string(),
                email: email.to_string(),
                skills: Some(skill_names.iter().map(|s| s.to_string()).collect()),
            },
        )?;
        created += 1;
    }
    Ok(created)
}
