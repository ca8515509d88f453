use crate::model::{DeveloperView, TaskView};

fn skills_suffix(task: &TaskView) -> String {
    let names = task.skill_names();
    if names.is_empty() {
        String::new()
    } else {
        format!("  [{}]", names.join(", "))
    }
}

fn assignee_suffix(task: &TaskView) -> String {
    task.developer
        .as_ref()
        .map(|d| format!("  @{}", d.name))
        .unwrap_or_default()
}

pub fn format_task_detail(task: &TaskView) -> String {
    let mut out = String::new();
    out.push_str(&format!("Id:          {}\n", task.task.id));
    out.push_str(&format!("Title:       {}\n", task.task.title));
    out.push_str(&format!("Status:      {}\n", task.task.status));
    if let Some(ref p) = task.task.parent_task_id {
        out.push_str(&format!("Parent:      {}\n", p));
    }
    if let Some(ref dev) = task.developer {
        out.push_str(&format!("Developer:   {} <{}>\n", dev.name, dev.email));
    }
    let skills = task.skill_names();
    if !skills.is_empty() {
        out.push_str(&format!("Skills:      {}\n", skills.join(", ")));
    }
    out.push_str(&format!("Created:     {}\n", task.task.created_at));
    out.push_str(&format!("Updated:     {}\n", task.task.updated_at));

    if !task.subtasks().is_empty() {
        out.push('\n');
        out.push_str("Subtasks:\n");
        for sub in task.subtasks() {
            write_tree(&mut out, sub, "  ", "  ");
        }
    }
    out
}

/// One line per developer: name, email, skills, then assigned task count.
pub fn format_developer_list(developers: &[DeveloperView]) -> String {
    let mut out = String::new();
    for dev in developers {
        let skills = dev.skill_names();
        out.push_str(&format!("{} <{}>", dev.developer.name, dev.developer.email));
        if !skills.is_empty() {
            out.push_str(&format!("  [{}]", skills.join(", ")));
        }
        if !dev.tasks.is_empty() {
            out.push_str(&format!("  ({} task(s))", dev.tasks.len()));
        }
        out.push('\n');
    }
    out
}

/// Render each root with its loaded subtasks using box-drawing connectors.
pub fn format_task_tree(roots: &[TaskView]) -> String {
    let mut out = String::new();
    for root in roots {
        write_tree(&mut out, root, "", "");
    }
    out
}

/// Write a task line and recurse into children.
/// `line_prefix` is what goes before the status icon on this task's line.
/// `child_prefix` is the base prefix for this task's children's tree connectors.
fn write_tree(out: &mut String, task: &TaskView, line_prefix: &str, child_prefix: &str) {
    out.push_str(&format!(
        "{}{} {}{}{}\n",
        line_prefix,
        task.task.status.icon(),
        task.task.title,
        skills_suffix(task),
        assignee_suffix(task)
    ));

    let children = task.subtasks();
    for (i, child) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;
        let (connector, extension) = if is_last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        write_tree(
            out,
            child,
            &format!("{child_prefix}{connector}"),
            &format!("{child_prefix}{extension}"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Skill, Status, Task, TaskSkill};

    fn make_task(title: &str, status: Status, skills: &[&str], subtasks: Vec<TaskView>) -> TaskView {
        TaskView {
            task: Task {
                id: title.to_string(),
                title: title.to_string(),
                status,
                developer_id: None,
                parent_task_id: None,
                created_at: "2025-01-01T00:00:00Z".to_string(),
                updated_at: "2025-01-01T00:00:00Z".to_string(),
            },
            skills: skills
                .iter()
                .map(|s| TaskSkill {
                    id: format!("ts-{s}"),
                    task_id: title.to_string(),
                    skill_id: s.to_string(),
                    skill: Skill {
                        id: s.to_string(),
                        name: s.to_string(),
                    },
                })
                .collect(),
            developer: None,
            subtasks: Some(subtasks),
        }
    }

    #[test]
    fn tree_single_root() {
        let tasks = vec![make_task("Build UI", Status::InProgress, &["Frontend"], vec![])];
        assert_eq!(format_task_tree(&tasks), "* Build UI  [Frontend]\n");
    }

    #[test]
    fn tree_with_children() {
        let tasks = vec![make_task(
            "root",
            Status::Todo,
            &[],
            vec![
                make_task("child1", Status::Done, &[], vec![]),
                make_task(
                    "child2",
                    Status::Todo,
                    &["Backend"],
                    vec![make_task("leaf", Status::Todo, &[], vec![])],
                ),
            ],
        )];
        let out = format_task_tree(&tasks);
        assert_eq!(
            out,
            ". root\n├── x child1\n└── . child2  [Backend]\n    └── . leaf\n"
        );
    }

    #[test]
    fn developer_list_shows_skills() {
        let conn = crate::db::open_memory().unwrap();
        crate::ops::seed(&conn).unwrap();
        let out = format_developer_list(&crate::ops::list_developers(&conn).unwrap());
        assert!(out.starts_with("Alice <alice@gmail.com>  [Frontend, UI/UX]\n"));
        assert_eq!(out.lines().count(), 4);
    }

    #[test]
    fn detail_lists_subtasks() {
        let task = make_task(
            "root",
            Status::Todo,
            &["Frontend", "Backend"],
            vec![make_task("child", Status::Todo, &[], vec![])],
        );
        let out = format_task_detail(&task);
        assert!(out.contains("Status:      TODO\n"));
        assert!(out.contains("Skills:      Frontend, Backend\n"));
        assert!(out.contains("Subtasks:\n  . child\n"));
    }
}
