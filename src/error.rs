/// Failures that carry meaning for callers, as opposed to infrastructure errors.
///
/// Operations return `anyhow::Result` and raise these with `bail!`; the HTTP
/// layer recovers them with `downcast_ref` to pick a status code.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("{0} not found")]
    NotFound(&'static str),
    /// A well-formed request forbidden by domain policy.
    #[error("{0}")]
    Rule(&'static str),
    #[error("{0}")]
    Invalid(String),
}

pub const DONE_TASK_DELETE: &str = "A completed task cannot be deleted";
pub const INCOMPLETE_SUBTASKS: &str = "Cannot mark task as Done until all subtasks are Done";
pub const SKILL_MISMATCH: &str = "Developer does not have the required skills for this task";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survives_anyhow_round_trip() {
        let err: anyhow::Error = TaskError::Rule(DONE_TASK_DELETE).into();
        match err.downcast_ref::<TaskError>() {
            Some(TaskError::Rule(msg)) => assert_eq!(*msg, DONE_TASK_DELETE),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn not_found_message() {
        assert_eq!(TaskError::NotFound("Task").to_string(), "Task not found");
    }
}
