//! Task records, live processes, and queued (wait-deferred) tasks.

use std::time::Instant;

/// A task as materialized from the workspace: required `cmd`, optional
/// `dir`/`wait`, and the ordered `vars` list (workspace-declared
/// variables first, then any `-e KEY=VALUE` overrides the client sent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Section label in the workspace; the task's name.
    pub name: String,
    /// Shell command line, passed to `<shell_bin> -c`.
    pub cmd: String,
    /// Working directory for the child, if set.
    pub dir: Option<String>,
    /// Name of another task this one waits on, if set.
    pub wait: Option<String>,
    /// `KEY=VALUE` environment entries, in declaration order.
    pub vars: Vec<String>,
}

impl Task {
    /// Append client-supplied `-e KEY=VALUE` overrides after the
    /// workspace-declared variables.
    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = String>) -> Self {
        self.vars.extend(overrides);
        self
    }
}

/// A live child process spawned from a [`Task`].
///
/// `task_name` is an owned copy: the originating [`Task`] is discarded
/// right after launch, so the process record must not borrow from it.
pub struct TaskProcess {
    /// The spawned child.
    pub child: std::process::Child,
    /// Name of the task that launched this process.
    pub task_name: String,
    /// When the child was forked.
    pub start_time: Instant,
}

impl TaskProcess {
    /// Operating-system process id of the child.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

/// A task whose launch is deferred until a process named by its `wait`
/// field reaps.
///
/// Invariant: a `PendingTask` always has a non-empty `wait`. The
/// dispatcher only ever queues a task that named a currently-live
/// process; see [`crate::server::launcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    /// The fully materialized task definition, including any `-e`
    /// overrides already folded into `vars`.
    pub task: Task,
}

impl PendingTask {
    /// The task name this entry waits on.
    pub fn wait_name(&self) -> &str {
        self.task
            .wait
            .as_deref()
            .expect("PendingTask must have a non-empty wait name")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_append_after_workspace_vars() {
        let task = Task {
            name: "build".to_string(),
            cmd: "make".to_string(),
            dir: None,
            wait: None,
            vars: vec!["FROM_WORKSPACE=1".to_string()],
        };
        let task = task.with_overrides(vec!["DEBUG=1".to_string()]);
        assert_eq!(
            task.vars,
            vec!["FROM_WORKSPACE=1".to_string(), "DEBUG=1".to_string()]
        );
    }

    #[test]
    fn pending_task_wait_name_reads_through() {
        let pending = PendingTask {
            task: Task {
                name: "test".to_string(),
                cmd: "./run".to_string(),
                dir: None,
                wait: Some("build".to_string()),
                vars: vec![],
            },
        };
        assert_eq!(pending.wait_name(), "build");
    }
}
