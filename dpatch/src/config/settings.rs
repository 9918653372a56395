//! Runtime application settings for dpatch.

use super::cli::{CliOptions, Command};
use dpatch_common::{DpatchError, MergeOptions};
use smart_default::SmartDefault;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

/// What this invocation of the `dpatch` binary should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Run the event-loop server (the default, no subcommand given).
    Server,
    /// Send one `TaskRun` request, optionally re-sending on `-w` changes.
    Run {
        /// Task name to run.
        name: String,
        /// `-e KEY=VALUE` overrides, in CLI order.
        vars: Vec<String>,
    },
    /// Send one `WorkspaceSet` request, optionally re-sending on `-w`
    /// changes.
    Set {
        /// Workspace file path to set.
        path: PathBuf,
    },
}

/// Runtime settings (validated config), shared by both the server and
/// the client run modes.
#[derive(Debug, SmartDefault)]
pub struct AppSettings {
    /// Address the server listens on / the client connects to.
    #[default(IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub address: IpAddr,

    /// TCP port the server listens on / the client connects to.
    #[default(9999)]
    pub port: u16,

    /// Capacity of the accepted-client slot store.
    #[default(30)]
    pub max_clients: usize,

    /// Listen backlog passed to the kernel on bind.
    #[default(3)]
    pub max_pending_conn: u32,

    /// Capacity of the live-process slot store.
    #[default(5)]
    pub process_store_count: usize,

    /// Capacity of the pending (`wait`-queued) task slot store.
    #[default(5)]
    pub task_store_count: usize,

    /// Size, in bytes, of the shared input/output byte buffers.
    #[default(1024)]
    pub buffer_size: usize,

    /// Per-socket receive/send timeout on accepted client connections.
    #[default(Duration::from_secs(5))]
    pub sock_timeout: Duration,

    /// Multiplexer poll timeout; also the upper bound on how stale a
    /// child's buffered output can get before it is drained.
    #[default(Duration::from_micros(66_666))]
    pub tick_interval: Duration,

    /// Shell binary used to run task commands (`<shell_bin> -c <cmd>`).
    #[default("/bin/sh".to_string())]
    pub shell_bin: String,

    /// Global log level.
    #[default(log::LevelFilter::Warn)]
    pub verbosity: log::LevelFilter,

    /// Workspace file to preload at server startup (`-f`).
    pub workspace_path: Option<PathBuf>,

    /// Additional log file to tee output into (`-l`).
    pub log_file: Option<PathBuf>,

    /// Directory to watch and resend the client request on changes
    /// (`-w`, client modes only).
    pub watch_path: Option<PathBuf>,

    /// Suppress terminal logging (`-q`). Does not affect `log_file`.
    #[default(false)]
    pub quiet: bool,

    /// Run the server as a detached background process (`-d`).
    #[default(false)]
    pub detached: bool,

    /// What this invocation should actually do.
    #[default(RunMode::Server)]
    pub run_mode: RunMode,
}

impl AppSettings {
    /// Parse CLI arguments, merge them over defaults, and validate.
    pub fn assemble() -> Result<Self, DpatchError> {
        let cli_opts = CliOptions::from_args();
        let mut settings = Self::default();
        settings.try_merge(cli_opts)?;
        settings.try_validate()
    }

    fn try_validate(self) -> Result<Self, DpatchError> {
        if self.max_clients == 0 {
            return Err(DpatchError::Config(
                "max_clients must be at least 1".to_string(),
            ));
        }
        if self.process_store_count == 0 {
            return Err(DpatchError::Config(
                "process_store_count must be at least 1".to_string(),
            ));
        }
        if self.task_store_count == 0 {
            return Err(DpatchError::Config(
                "task_store_count must be at least 1".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(DpatchError::Config("port must be nonzero".to_string()));
        }
        // 4 bytes total_length + 4 bytes kind + 4 bytes token_count + at
        // least one 1-byte token kind and its NUL terminator.
        const MIN_FRAME: usize = 14;
        if self.buffer_size < MIN_FRAME {
            return Err(DpatchError::Config(format!(
                "buffer_size must be at least {} bytes",
                MIN_FRAME
            )));
        }
        Ok(self)
    }
}

impl MergeOptions<CliOptions> for AppSettings {
    fn try_merge(&mut self, opts: CliOptions) -> Result<(), DpatchError> {
        self.run_mode = match opts.command {
            None => RunMode::Server,
            Some(Command::Run { name, vars }) => RunMode::Run { name, vars },
            Some(Command::Set { path }) => RunMode::Set { path },
        };

        self.verbosity = match opts.verbosity {
            0 => self.verbosity,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        self.quiet = opts.quiet || self.quiet;
        if self.quiet {
            // -q forces the quietest level regardless of -v count.
            self.verbosity = log::LevelFilter::Error;
        }
        self.detached = opts.detached || self.detached;

        dpatch_common::assign_if_some!(self.port, opts.port);
        dpatch_common::assign_if_some!(self.workspace_path, opts.workspace_path);
        dpatch_common::assign_if_some!(self.log_file, opts.log_file);
        dpatch_common::assign_if_some!(self.watch_path, opts.watch_path);

        Ok(())
    }
}
