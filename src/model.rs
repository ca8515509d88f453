use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "TODO")]
    Todo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Done")]
    Done,
}

impl Status {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "TODO" => Ok(Self::Todo),
            "In Progress" => Ok(Self::InProgress),
            "Done" => Ok(Self::Done),
            _ => anyhow::bail!("invalid status '{s}': must be TODO, In Progress, or Done"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Todo => ".",
            Self::InProgress => "*",
            Self::Done => "x",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl rusqlite::types::FromSql for Status {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let s = value.as_str()?;
        Status::parse(s).map_err(|e| rusqlite::types::FromSqlError::Other(e.into()))
    }
}

impl rusqlite::types::ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Developer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: Status,
    pub developer_id: Option<String>,
    pub parent_task_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Join row between a task and a skill it requires.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSkill {
    pub id: String,
    pub task_id: String,
    pub skill_id: String,
    pub skill: Skill,
}

/// Join row between a developer and a skill they have.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeveloperSkill {
    pub id: String,
    pub developer_id: String,
    pub skill_id: String,
    pub skill: Skill,
}

/// A task with its skills, assignee and (when loaded) nested subtasks.
///
/// `subtasks` is `None` when that level was not fetched, which keeps the key
/// out of the JSON entirely rather than pretending the task is a leaf.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub skills: Vec<TaskSkill>,
    pub developer: Option<Developer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<TaskView>>,
}

impl TaskView {
    pub fn skill_names(&self) -> Vec<&str> {
        self.skills.iter().map(|s| s.skill.name.as_str()).collect()
    }

    pub fn subtasks(&self) -> &[TaskView] {
        self.subtasks.as_deref().unwrap_or_default()
    }
}

/// A task as listed under a developer: skills only, no nesting.
#[derive(Debug, Clone, Serialize)]
pub struct AssignedTask {
    #[serde(flatten)]
    pub task: Task,
    pub skills: Vec<TaskSkill>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeveloperView {
    #[serde(flatten)]
    pub developer: Developer,
    pub skills: Vec<DeveloperSkill>,
    pub tasks: Vec<AssignedTask>,
}

impl DeveloperView {
    pub fn skill_names(&self) -> Vec<&str> {
        self.skills.iter().map(|s| s.skill.name.as_str()).collect()
    }
}

/// Join row seen from the skill side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillTask {
    pub id: String,
    pub task_id: String,
    pub skill_id: String,
    pub task: Task,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillView {
    #[serde(flatten)]
    pub skill: Skill,
    pub tasks: Vec<SkillTask>,
}
