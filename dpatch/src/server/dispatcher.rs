//! Routes a decoded client request to the right handler and always
//! answers with exactly one response before closing the connection.
//! dpatch's wire protocol is strictly request/response, one shot per
//! accepted socket.

use super::Server;
use crate::task::{PendingTask, Task};
use dpatch_common::{DpatchError, Message, MessageKind};

impl Server {
    /// Handle one fully-decoded request from client slot `index`.
    pub(super) fn dispatch(&mut self, index: usize, message: Message) {
        match message.kind {
            MessageKind::TaskRun => self.handle_task_run(index, &message),
            MessageKind::WorkspaceSet => self.handle_workspace_set(index, &message),
            MessageKind::TaskInfo | MessageKind::WorkspaceInfo | MessageKind::ProcInfo => {
                self.respond(index, MessageKind::Err, "not implemented".to_string());
            }
            _ => self.respond(index, MessageKind::Err, "Invalid command".to_string()),
        }
    }

    fn handle_task_run(&mut self, index: usize, message: &Message) {
        let mut name: Option<&str> = None;
        let mut overrides: Vec<String> = Vec::new();
        for token in &message.tokens {
            match token.kind {
                dpatch_common::TokenKind::Arg if name.is_none() => name = Some(token.value),
                dpatch_common::TokenKind::Var => overrides.push(token.value.to_string()),
                _ => {}
            }
        }

        let name = match name {
            Some(n) => n,
            None => {
                self.respond(index, MessageKind::Err, "Invalid command".to_string());
                return;
            }
        };

        let workspace = match &self.workspace {
            Some(path) => path.clone(),
            None => {
                self.respond(index, MessageKind::Err, "Workspace not found".to_string());
                return;
            }
        };

        let task = match crate::workspace::materialize_task(&workspace, name) {
            Ok(task) => task.with_overrides(overrides),
            Err(DpatchError::TaskNotFound(_)) => {
                self.respond(
                    index,
                    MessageKind::Err,
                    format!("Task '{}' not found", name),
                );
                return;
            }
            Err(e) => {
                self.respond(index, MessageKind::Err, e.as_wire_message());
                return;
            }
        };

        if let Some(wait) = task.wait.clone() {
            if self.process_running(Some(&wait)) {
                match self.enqueue(task) {
                    Ok(()) => self.respond(
                        index,
                        MessageKind::Success,
                        format!("Task '{}' put in queue", name),
                    ),
                    Err(e) => self.respond(index, MessageKind::Err, e.as_wire_message()),
                }
                return;
            }
        }

        match self.launch_task(task) {
            Ok(_) => self.respond(
                index,
                MessageKind::Success,
                format!("Task '{}' started successfully", name),
            ),
            Err(e) => self.respond(index, MessageKind::Err, e.as_wire_message()),
        }
    }

    fn handle_workspace_set(&mut self, index: usize, message: &Message) {
        let path = message
            .tokens
            .iter()
            .find(|t| t.kind == dpatch_common::TokenKind::Arg)
            .map(|t| t.value.to_string());

        let path = match path {
            Some(p) => p,
            None => {
                self.respond(index, MessageKind::Err, "Invalid command".to_string());
                return;
            }
        };

        let path_buf = std::path::PathBuf::from(&path);
        match crate::workspace::check_readable(&path_buf) {
            Ok(()) => {
                self.workspace = Some(path_buf);
                self.respond(
                    index,
                    MessageKind::Success,
                    format!("Workspace '{}' set as active", path),
                );
            }
            Err(_) => {
                self.respond(index, MessageKind::Err, "Workspace not found".to_string());
            }
        }
    }

    /// Queue `task` behind the process it names in `wait`.
    ///
    /// Invariant upheld here: a task is only ever queued when its `wait`
    /// target is currently live, so `PendingTask::wait_name` always has
    /// something to match once that target reaps.
    fn enqueue(&mut self, task: Task) -> Result<(), DpatchError> {
        if self.pending.is_full() {
            return Err(DpatchError::StoreFull(
                "Task store capacity reached".to_string(),
            ));
        }
        self.pending.push(PendingTask { task });
        Ok(())
    }

    /// Is a process named `wait` currently live?
    pub(super) fn process_running(&self, wait: Option<&str>) -> bool {
        let wait = match wait {
            Some(w) => w,
            None => return false,
        };
        self.processes
            .iter_rev()
            .any(|(_, process)| process.task_name == wait)
    }

    /// Send one response and close the connection, per the
    /// request/response/close contract.
    pub(super) fn respond(&mut self, index: usize, kind: MessageKind, payload: String) {
        let message = Message::single(kind, &payload);
        let encoded = dpatch_common::encode(&message);
        if let Some(slot) = self.clients.get_mut(index) {
            use std::io::Write;
            if let Err(e) = slot.stream.write_all(&encoded) {
                log::debug!("failed to write response to client {}: {}", index, e);
            }
        }
        self.close_client(index);
    }

    /// Answer a malformed/unreadable request with a generic error and
    /// close, without having decoded a [`Message`] to dispatch on.
    pub(super) fn send_error_and_close(&mut self, index: usize, err: &DpatchError) {
        self.respond(index, MessageKind::Err, err.as_wire_message());
    }
}
