//! Command-line options for dpatch.

use std::path::PathBuf;
use structopt::StructOpt;

/// CLI configuration flags, top-level.
#[derive(Debug, StructOpt)]
#[structopt(name = "dpatch", about = "a small task-dispatch agent")]
pub struct CliOptions {
    /// Verbosity level.
    #[structopt(short = "v", parse(from_occurrences))]
    pub verbosity: u64,

    /// Quiet mode (no logging to the terminal).
    #[structopt(short = "q")]
    pub quiet: bool,

    /// Run the server as a separate detached process.
    #[structopt(short = "d")]
    pub detached: bool,

    /// Port to serve/connect to.
    #[structopt(short = "p")]
    pub port: Option<u16>,

    /// Workspace file to preload at server startup.
    #[structopt(short = "f", parse(from_os_str))]
    pub workspace_path: Option<PathBuf>,

    /// File to additionally write logs into.
    #[structopt(short = "l", parse(from_os_str))]
    pub log_file: Option<PathBuf>,

    /// In client mode, watch this directory and resend the request on
    /// every change.
    #[structopt(short = "w", parse(from_os_str))]
    pub watch_path: Option<PathBuf>,

    /// `run`/`set` client subcommand; absent means "run as server".
    #[structopt(subcommand)]
    pub command: Option<Command>,
}

/// The one-shot client actions dpatch can send to a running agent.
#[derive(Debug, StructOpt)]
pub enum Command {
    /// Run a task through a dpatch agent.
    #[structopt(name = "run")]
    Run {
        /// Task name, as declared in the active workspace.
        name: String,

        /// Environment override, `KEY=VALUE`. May be repeated.
        #[structopt(short = "e")]
        vars: Vec<String>,
    },
    /// Set the active workspace in a dpatch agent.
    #[structopt(name = "set")]
    Set {
        /// Path to the workspace file.
        #[structopt(parse(from_os_str))]
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppSettings;
    use dpatch_common::MergeOptions;

    #[test]
    fn cli_basic_defaults() {
        let no_args = vec!["argv0"];
        let opts = CliOptions::from_iter_safe(no_args).unwrap();
        assert_eq!(opts.verbosity, 0);
        assert!(opts.command.is_none());
    }

    #[test]
    fn cli_verbosity_raises_level() {
        let args = vec!["argv0", "-vv"];
        let opts = CliOptions::from_iter_safe(args).unwrap();
        assert_eq!(opts.verbosity, 2);

        let mut settings = AppSettings::default();
        settings.try_merge(opts).unwrap();
        assert_eq!(settings.verbosity, log::LevelFilter::Debug);
    }

    #[test]
    fn cli_run_subcommand_parses_repeated_vars() {
        let args = vec!["argv0", "run", "build", "-e", "A=1", "-e", "B=2"];
        let opts = CliOptions::from_iter_safe(args).unwrap();
        match opts.command {
            Some(Command::Run { name, vars }) => {
                assert_eq!(name, "build");
                assert_eq!(vars, vec!["A=1".to_string(), "B=2".to_string()]);
            }
            other => panic!("expected Run command, got {:?}", other),
        }
    }

    #[test]
    fn cli_set_subcommand_parses_path() {
        let args = vec!["argv0", "set", "/tmp/workspace.ini"];
        let opts = CliOptions::from_iter_safe(args).unwrap();
        match opts.command {
            Some(Command::Set { path }) => assert_eq!(path, PathBuf::from("/tmp/workspace.ini")),
            other => panic!("expected Set command, got {:?}", other),
        }
    }

    #[test]
    fn cli_port_and_workspace_flags_merge_over_defaults() {
        let args = vec!["argv0", "-p", "1234", "-f", "/ws.ini"];
        let opts = CliOptions::from_iter_safe(args).unwrap();

        let mut settings = AppSettings::default();
        settings.try_merge(opts).unwrap();
        assert_eq!(settings.port, 1234);
        assert_eq!(settings.workspace_path, Some(PathBuf::from("/ws.ini")));
    }
}
