//! Spawning a [`Task`] as a child process.

use super::{mux, Server};
use crate::task::{Task, TaskProcess};
use dpatch_common::DpatchError;
use std::os::unix::io::AsRawFd;
use std::process::{Command, Stdio};
use std::time::Instant;

impl Server {
    /// Launch `task` as `<shell_bin> -c <cmd>`, with a clean environment
    /// built from `task.vars` and the working directory from `task.dir`
    /// if set.
    ///
    /// The child's stdout/stderr pipes are flipped to non-blocking right
    /// after spawn, since the multiplexer polls them alongside client
    /// sockets and must never block a tick on a slow child.
    pub(super) fn launch_task(&mut self, task: Task) -> Result<usize, DpatchError> {
        if self.processes.is_full() {
            return Err(DpatchError::StoreFull(
                "Process store capacity reached".to_string(),
            ));
        }

        let mut command = Command::new(&self.settings.shell_bin);
        command
            .arg("-c")
            .arg(&task.cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear();

        for entry in &task.vars {
            if let Some((key, value)) = entry.split_once('=') {
                command.env(key, value);
            }
        }
        if let Some(dir) = &task.dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| DpatchError::ForkFailed(format!("{}: {}", task.name, e)))?;

        set_nonblocking(&child.stdout)?;
        set_nonblocking(&child.stderr)?;

        let process = TaskProcess {
            child,
            task_name: task.name.clone(),
            start_time: Instant::now(),
        };

        log::info!("launched task '{}' (pid {})", task.name, process.pid());
        let index = self.processes.push(process).ok_or_else(|| {
            DpatchError::StoreFull("Process store capacity reached".to_string())
        })?;
        if let Some(process) = self.processes.get(index) {
            mux::register_process(self.poll.registry(), &self.settings, process, index);
        }
        Ok(index)
    }
}

fn set_nonblocking<T: AsRawFd>(pipe: &Option<T>) -> Result<(), DpatchError> {
    use nix::fcntl::{fcntl, FcntlArg, OFlag};

    let fd = match pipe {
        Some(p) => p.as_raw_fd(),
        None => return Ok(()),
    };

    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(|e| DpatchError::PipeFailed(e.to_string()))?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(|e| DpatchError::PipeFailed(e.to_string()))?;
    Ok(())
}
