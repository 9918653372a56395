//! Non-blocking reap of exited children, pipe draining, and the
//! pending-task queue releaser. §4.5.

use super::Server;
use dpatch_common::MessageKind;
use std::io::Read;
use std::process::ExitStatus;
use std::time::Duration;

impl Server {
    /// Drain whatever is currently buffered on task `index`'s stdout pipe
    /// and fan it out as `PrintOut`, tagged with the task's name.
    pub(super) fn drain_stdout(&mut self, index: usize) {
        self.drain_pipe(index, true);
    }

    /// Drain whatever is currently buffered on task `index`'s stderr pipe
    /// and fan it out as `PrintErr`, tagged with the task's name.
    pub(super) fn drain_stderr(&mut self, index: usize) {
        self.drain_pipe(index, false);
    }

    fn drain_pipe(&mut self, index: usize, is_stdout: bool) {
        let buffer_size = self.settings.buffer_size;

        let chunk = match self.processes.get_mut(index) {
            Some(process) => {
                let mut buf = vec![0u8; buffer_size];
                let read = if is_stdout {
                    process.child.stdout.as_mut().map(|s| s.read(&mut buf))
                } else {
                    process.child.stderr.as_mut().map(|s| s.read(&mut buf))
                };
                match read {
                    Some(Ok(0)) | None => None,
                    Some(Ok(n)) => {
                        buf.truncate(n);
                        Some((process.task_name.clone(), buf))
                    }
                    Some(Err(e)) if e.kind() == std::io::ErrorKind::WouldBlock => None,
                    Some(Err(e)) => {
                        log::debug!("pipe read error on task '{}': {}", process.task_name, e);
                        None
                    }
                }
            }
            None => None,
        };

        if let Some((task_name, bytes)) = chunk {
            let text = String::from_utf8_lossy(&bytes);
            let kind = if is_stdout {
                MessageKind::PrintOut
            } else {
                MessageKind::PrintErr
            };
            self.fanout(kind, &format!("[{}] {}", task_name, text), None);
        }
    }

    /// Reap every live process, once per tick, after I/O dispatch.
    ///
    /// Runs a second drain pass over each process's pipes before waiting
    /// on it. A zero-byte read here is purely informational (the child
    /// closed that stream); the authoritative end-of-task signal is the
    /// non-blocking wait below, per §4.5.
    pub(super) fn reap_and_drain(&mut self) {
        let indices: Vec<usize> = self.processes.iter_rev().map(|(i, _)| i).collect();
        for index in indices {
            self.drain_stdout(index);
            self.drain_stderr(index);
            self.try_reap(index);
        }
    }

    fn try_reap(&mut self, index: usize) {
        let outcome = match self.processes.get_mut(index) {
            Some(process) => process.child.try_wait(),
            None => return,
        };

        match outcome {
            Ok(None) => {}
            Ok(Some(status)) => self.complete_process(index, status),
            Err(e) => {
                log::warn!("error waiting for task process at slot {}: {}", index, e);
                self.close_process(index);
            }
        }
    }

    fn complete_process(&mut self, index: usize, status: ExitStatus) {
        let process = match self.close_process(index) {
            Some(p) => p,
            None => return,
        };

        let elapsed = format_elapsed(process.start_time.elapsed());
        log::info!(
            "task '{}' (pid {}) finished in {} with status {}",
            process.task_name,
            process.pid(),
            elapsed,
            status
        );

        self.fanout(
            MessageKind::TaskComplete,
            &format!(
                "Task '{}' finished in {} with status {}",
                process.task_name, elapsed, status
            ),
            None,
        );

        self.release_pending(&process.task_name);
    }

    /// Release at most one queued task whose `wait` names
    /// `completed_name`. Scans highest-index-down, the same convention
    /// the reaper itself uses above.
    fn release_pending(&mut self, completed_name: &str) {
        let candidates: Vec<usize> = self
            .pending
            .iter_rev()
            .filter(|(_, pending)| pending.wait_name() == completed_name)
            .map(|(i, _)| i)
            .collect();

        for index in candidates {
            let task = match self.pending.get(index) {
                Some(pending) => pending.task.clone(),
                None => continue,
            };

            match self.launch_task(task) {
                Ok(_) => {
                    self.pending.remove(index);
                    return;
                }
                Err(e) => {
                    log::warn!(
                        "failed to launch queued task waiting on '{}': {}",
                        completed_name,
                        e
                    );
                }
            }
        }
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_elapsed_renders_hh_mm_ss() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(65)), "00:01:05");
        assert_eq!(format_elapsed(Duration::from_secs(3661)), "01:01:01");
    }
}
