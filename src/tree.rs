//! Creation and bulk update of whole task trees.
//!
//! Both walks recurse over the request payload and never hold more state than
//! the id of the parent they are attaching to. Neither runs in a transaction:
//! when a node fails, nodes already written stay written.

use anyhow::{bail, Result};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::new_id;
use crate::error::{TaskError, SKILL_MISMATCH};
use crate::infer::SkillInference;
use crate::model::{Status, TaskView};
use crate::ops::{self, apply_scalars, require_task, task_view, VIEW_DEPTH};
use crate::skills;
use crate::validate::{skills_cover, validate_title};

/// A task to create, with optional nested subtasks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub developer_id: Option<String>,
    /// Explicit skill names. Empty or absent means "ask the model".
    #[serde(default)]
    pub skills: Option<Vec<String>>,
    #[serde(default)]
    pub subtasks: Option<Vec<NewTask>>,
}

/// Partial update of a task. Entries in `subtasks` without an `id` but with a
/// title are created under the task that lists them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default)]
    pub id: Option<String>,
    pub title: Option<String>,
    pub status: Option<Status>,
    /// Present (even empty): replaces every skill link of the task.
    pub skills: Option<Vec<String>>,
    #[serde(default)]
    pub subtasks: Option<Vec<TaskPatch>>,
}

fn skill_names_for(inference: &dyn SkillInference, payload: &NewTask) -> Vec<String> {
    match payload.skills.as_deref() {
        Some(names) if !names.is_empty() => names.to_vec(),
        _ => inference.identify(&payload.title),
    }
}

/// Create `payload` under `parent_id` (a root task when `None`), then its
/// subtasks in input order.
///
/// The returned view carries `subtasks` only when some were created.
pub fn create_task_tree(
    conn: &Connection,
    inference: &dyn SkillInference,
    payload: &NewTask,
    parent_id: Option<&str>,
) -> Result<TaskView> {
    validate_title(&payload.title)?;
    let names = skill_names_for(inference, payload);

    let developer_id = payload.developer_id.as_deref().filter(|d| !d.is_empty());
    if let Some(dev) = developer_id {
        let have = skills::developer_skill_names(conn, dev)?;
        if ops::find_developer(conn, dev)?.is_none() || !skills_cover(&have, &names) {
            bail!(TaskError::Rule(SKILL_MISMATCH));
        }
    }

    let skill_ids = skills::resolve(conn, &names)?;
    let id = new_id();
    conn.execute(
        "INSERT INTO tasks (id, title, developer_id, parent_task_id) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, payload.title, developer_id, parent_id],
    )?;
    skills::attach_to_task(conn, &id, &skill_ids)?;
    log::debug!("created task {id} '{}' with skills {names:?}", payload.title);

    let mut created = Vec::new();
    for sub in payload.subtasks.as_deref().unwrap_or_default() {
        created.push(create_task_tree(conn, inference, sub, Some(&id))?);
    }

    let task = require_task(conn, &id)?;
    let mut view = task_view(conn, task, 0)?;
    if !created.is_empty() {
        view.subtasks = Some(created);
    }
    Ok(view)
}

/// Apply `patch` to task `id` and walk its subtask entries, then reload the
/// task with two levels of subtasks.
pub fn update_task_tree(
    conn: &Connection,
    inference: &dyn SkillInference,
    id: &str,
    patch: &TaskPatch,
) -> Result<TaskView> {
    require_task(conn, id)?;
    patch_node(conn, inference, id, patch)?;
    let task = require_task(conn, id)?;
    task_view(conn, task, VIEW_DEPTH)
}

fn patch_node(
    conn: &Connection,
    inference: &dyn SkillInference,
    id: &str,
    patch: &TaskPatch,
) -> Result<()> {
    apply_scalars(conn, id, patch.title.as_deref(), patch.status)?;
    if let Some(names) = &patch.skills {
        skills::replace_task_skills(conn, id, names)?;
    }

    for sub in patch.subtasks.as_deref().unwrap_or_default() {
        match (&sub.id, sub.title.as_deref()) {
            (Some(sub_id), _) => patch_node(conn, inference, sub_id, sub)?,
            (None, Some(title)) if !title.is_empty() => {
                let new = NewTask {
                    title: title.to_string(),
                    developer_id: None,
                    skills: sub.skills.clone(),
                    subtasks: sub.subtasks.as_deref().map(to_new_tasks),
                };
                create_task_tree(conn, inference, &new, Some(id))?;
            }
            _ => log::debug!("ignoring subtask entry of {id} with neither id nor title"),
        }
    }
    Ok(())
}

/// Reinterpret nested patch entries as creations, as happens below a new
/// subtask. Entries without a title cannot be created and are dropped.
fn to_new_tasks(patches: &[TaskPatch]) -> Vec<NewTask> {
    patches
        .iter()
        .filter_map(|p| {
            let title = p.title.clone().filter(|t| !t.is_empty())?;
            Some(NewTask {
                title,
                developer_id: None,
                skills: p.skills.clone(),
                subtasks: p.subtasks.as_deref().map(to_new_tasks),
            })
        })
        .collect()
}
