//! The dpatch server: accepts client connections, runs tasks, and fans
//! their output and completion back out to every connected client.

pub mod connection;
pub mod daemon;
pub mod dispatcher;
pub mod fanout;
pub mod launcher;
pub mod mux;
pub mod reaper;

use crate::config::AppSettings;
use crate::task::{PendingTask, TaskProcess};
use connection::ClientSlot;
use dpatch_common::{DpatchError, Store};
use mio::net::TcpListener;
use mio::Poll;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// All server-owned state for a single running agent.
pub struct Server {
    settings: AppSettings,
    workspace: Option<PathBuf>,
    listener: TcpListener,
    poll: Poll,
    clients: Store<ClientSlot>,
    processes: Store<TaskProcess>,
    pending: Store<PendingTask>,
}

impl Server {
    /// Bind the listen socket and, if `-f` named a workspace, confirm it
    /// is readable (adopted non-fatally: a bad `-f` path is logged and
    /// otherwise ignored, the server still starts with no active
    /// workspace).
    pub fn new(settings: AppSettings) -> Result<Self, DpatchError> {
        let mut listener =
            connection::bind(settings.address, settings.port, settings.max_pending_conn)?;

        let poll = Poll::new()
            .map_err(|e| DpatchError::AcceptFailed(format!("failed to create poll: {}", e)))?;
        mux::register_listener(poll.registry(), &mut listener).map_err(|e| {
            DpatchError::AcceptFailed(format!("failed to register listen socket: {}", e))
        })?;

        let workspace = match &settings.workspace_path {
            Some(path) => match crate::workspace::check_readable(path) {
                Ok(()) => Some(path.clone()),
                Err(e) => {
                    log::warn!("ignoring unreadable preload workspace: {}", e);
                    None
                }
            },
            None => None,
        };

        let clients = Store::with_capacity(settings.max_clients);
        let processes = Store::with_capacity(settings.process_store_count);
        let pending = Store::with_capacity(settings.task_store_count);

        Ok(Server {
            settings,
            workspace,
            listener,
            poll,
            clients,
            processes,
            pending,
        })
    }

    /// Run the event loop until `shutdown` is set (by a signal handler).
    pub fn run(mut self, shutdown: Arc<AtomicBool>) -> Result<(), DpatchError> {
        log::info!(
            "dpatch listening on {}:{}",
            self.settings.address,
            self.settings.port
        );

        while !shutdown.load(Ordering::Relaxed) {
            self.tick()?;
        }

        log::info!("shutting down, closing {} client connections", self.clients.len());
        self.drain_clients();
        Ok(())
    }

    fn tick(&mut self) -> Result<(), DpatchError> {
        let events = mux::poll_tick(&mut self.poll, &self.settings)?;

        for event in events.iter() {
            match mux::classify(&self.settings, event.token()) {
                mux::Readiness::Listener => self.accept(),
                mux::Readiness::Client(index) => self.handle_client_readable(index),
                mux::Readiness::ProcessOut(index) => self.drain_stdout(index),
                mux::Readiness::ProcessErr(index) => self.drain_stderr(index),
            }
        }

        self.reap_and_drain();
        Ok(())
    }

    fn handle_client_readable(&mut self, index: usize) {
        let mut buf = vec![0u8; self.settings.buffer_size];
        let stream = match self.clients.get_mut(index) {
            Some(slot) => &mut slot.stream,
            None => return,
        };

        use std::io::Read;
        match stream.read(&mut buf) {
            Ok(0) => {
                self.close_client(index);
            }
            Ok(n) => match dpatch_common::decode(&buf[..n]) {
                Ok(message) => self.dispatch(index, message),
                Err(e) => {
                    log::debug!("dropping client {}: {}", index, e);
                    self.send_error_and_close(index, &e);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => {
                log::debug!("read error on client {}: {}", index, e);
                self.close_client(index);
            }
        }
    }

    /// Deregister and remove client slot `index`. The single path by
    /// which a client socket stops being polled; every other removal
    /// site calls through here rather than `self.clients.remove` directly.
    pub(super) fn close_client(&mut self, index: usize) {
        if let Some(mut slot) = self.clients.remove(index) {
            mux::deregister_client(self.poll.registry(), &mut slot);
        }
    }

    /// Deregister and remove process slot `index`, returning the removed
    /// record so the caller can still log/report on it.
    pub(super) fn close_process(&mut self, index: usize) -> Option<TaskProcess> {
        let process = self.processes.remove(index)?;
        mux::deregister_process(self.poll.registry(), &process);
        Some(process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpatch_common::{Message, MessageKind, Token, TokenKind};
    use std::io::Write;
    use std::time::{Duration, Instant};
    use tempfile::NamedTempFile;

    fn test_settings() -> AppSettings {
        let mut settings = AppSettings::default();
        settings.port = 0;
        settings.max_clients = 4;
        settings.process_store_count = 1;
        settings.task_store_count = 2;
        settings
    }

    fn workspace_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn task_run(server: &mut Server, name: &str, vars: &[&str]) {
        let mut tokens = vec![Token::new(TokenKind::Arg, name)];
        tokens.extend(vars.iter().map(|v| Token::new(TokenKind::Var, v)));
        server.dispatch(0, Message::new(MessageKind::TaskRun, tokens));
    }

    fn wait_until(server: &mut Server, timeout: Duration, condition: impl Fn(&Server) -> bool) {
        let deadline = Instant::now() + timeout;
        loop {
            server.reap_and_drain();
            if condition(server) {
                return;
            }
            if Instant::now() >= deadline {
                panic!("condition not met before timeout");
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn wait_dependency_queues_then_launches_after_reap() {
        // S3: b's wait names a currently-live a, so b is queued, then
        // launched once a reaps.
        let file = workspace_file("[a]\ncmd = sleep 0.2\n\n[b]\ncmd = true\nwait = a\n");
        let mut settings = test_settings();
        settings.process_store_count = 2;
        let mut server = Server::new(settings).unwrap();
        server.workspace = Some(file.path().to_path_buf());

        task_run(&mut server, "a", &[]);
        assert_eq!(server.processes.len(), 1);

        task_run(&mut server, "b", &[]);
        assert_eq!(server.pending.len(), 1, "b should be queued behind live a");
        assert_eq!(server.processes.len(), 1, "b must not be launched yet");

        wait_until(&mut server, Duration::from_secs(2), |s| s.pending.is_empty());
        wait_until(&mut server, Duration::from_secs(2), |s| s.processes.is_empty());
    }

    #[test]
    fn override_vars_reach_the_child_environment() {
        // S4: -e DEBUG=1 must be visible to the spawned shell.
        let out_file = NamedTempFile::new().unwrap();
        let out_path = out_file.path().to_path_buf();
        let file = workspace_file(&format!(
            "[dump]\ncmd = echo \"$DEBUG\" > '{}'\n",
            out_path.display()
        ));
        let mut server = Server::new(test_settings()).unwrap();
        server.workspace = Some(file.path().to_path_buf());

        task_run(&mut server, "dump", &["DEBUG=1"]);
        wait_until(&mut server, Duration::from_secs(2), |s| s.processes.is_empty());

        let contents = std::fs::read_to_string(&out_path).unwrap();
        assert_eq!(contents.trim(), "1");
    }

    #[test]
    fn store_full_rejects_second_task_while_first_still_completes() {
        // S6: process capacity 1, one task already running; a second,
        // non-waiting task is rejected, and the first still completes.
        let file = workspace_file("[slow]\ncmd = sleep 0.2\n\n[fast]\ncmd = true\n");
        let mut settings = test_settings();
        settings.process_store_count = 1;
        let mut server = Server::new(settings).unwrap();
        server.workspace = Some(file.path().to_path_buf());

        task_run(&mut server, "slow", &[]);
        assert_eq!(server.processes.len(), 1);

        let fast = crate::workspace::materialize_task(file.path(), "fast").unwrap();
        let err = server.launch_task(fast).unwrap_err();
        assert!(matches!(err, DpatchError::StoreFull(_)));

        wait_until(&mut server, Duration::from_secs(2), |s| s.processes.is_empty());
    }
}
