//! The workspace file: a minimal INI-shaped catalog of named tasks.
//!
//! The format is intentionally smaller than full INI: no `;`-comments,
//! no quoted values, no nested sections. A small, purpose-built
//! line-oriented state machine rather than a wrapper around a
//! general-purpose INI crate.

use crate::task::Task;
use dpatch_common::DpatchError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Confirm `path` is readable, without materializing anything from it.
///
/// Used by the `WorkspaceSet` request and by server startup's `-f`
/// preload: a workspace is only ever adopted if it can be opened.
pub fn check_readable(path: &Path) -> Result<(), DpatchError> {
    File::open(path)
        .map(|_| ())
        .map_err(|e| DpatchError::WorkspaceUnreadable(format!("{}: {}", path.display(), e)))
}

/// Scan `path` for a section named `task_name` and materialize it into a
/// [`Task`].
///
/// Fails with `TaskNotFound` if no section matches, or if the matching
/// section has no `cmd` key.
pub fn materialize_task(path: &Path, task_name: &str) -> Result<Task, DpatchError> {
    let file = File::open(path)
        .map_err(|e| DpatchError::WorkspaceUnreadable(format!("{}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);

    let mut current_section: Option<String> = None;
    let mut pending: Option<(String, String)> = None;

    let mut cmd: Option<String> = None;
    let mut dir: Option<String> = None;
    let mut wait: Option<String> = None;
    let mut vars: Vec<String> = Vec::new();

    let mut flush = |current_section: &Option<String>,
                     pending: Option<(String, String)>,
                     cmd: &mut Option<String>,
                     dir: &mut Option<String>,
                     wait: &mut Option<String>,
                     vars: &mut Vec<String>| {
        let (key, value) = match pending {
            Some(kv) => kv,
            None => return,
        };
        if current_section.as_deref() != Some(task_name) {
            return;
        }
        match key.as_str() {
            "cmd" => *cmd = Some(value),
            "dir" => *dir = Some(value),
            "wait" => *wait = Some(value),
            other => vars.push(format!("{}={}", other, value)),
        }
    };

    for line in reader.lines() {
        let line = line
            .map_err(|e| DpatchError::WorkspaceUnreadable(format!("{}: {}", path.display(), e)))?;

        let trimmed = line.trim_start();
        let had_leading_whitespace = trimmed.len() != line.len();

        if trimmed.trim_end().is_empty() {
            // A wholly blank line resets parse state.
            flush(
                &current_section,
                pending.take(),
                &mut cmd,
                &mut dir,
                &mut wait,
                &mut vars,
            );
            continue;
        }

        if trimmed.starts_with('#') {
            // A comment line, even indented, never joins a pending value.
            continue;
        }

        if had_leading_whitespace && pending.is_some() {
            // Continuation line: append to the pending value.
            let (_, value) = pending.as_mut().unwrap();
            value.push('\n');
            value.push_str(trimmed.trim_end());
            continue;
        }

        // Any non-continuation, non-comment line ends whatever value was
        // pending.
        flush(
            &current_section,
            pending.take(),
            &mut cmd,
            &mut dir,
            &mut wait,
            &mut vars,
        );

        if trimmed.starts_with('[') {
            let name = match trimmed.find(']') {
                Some(end) => &trimmed[1..end],
                None => trimmed[1..].trim_end(),
            };
            current_section = Some(name.to_string());
            continue;
        }

        match trimmed.find('=') {
            Some(eq) => {
                let key = trimmed[..eq].trim().to_string();
                let value = trimmed[eq + 1..].trim().to_string();
                pending = Some((key, value));
            }
            None => {
                pending = Some((trimmed.trim_end().to_string(), String::new()));
            }
        }
    }

    // EOF with a value still pending.
    flush(&current_section, pending.take(), &mut cmd, &mut dir, &mut wait, &mut vars);

    let cmd = cmd.ok_or_else(|| DpatchError::TaskNotFound(task_name.to_string()))?;
    Ok(Task {
        name: task_name.to_string(),
        cmd,
        dir,
        wait,
        vars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn workspace(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn materializes_cmd_dir_wait_and_leaves_vars_empty() {
        // S2: sections [a] and [b], b.wait=a, no extra vars on b.
        let file = workspace(
            "[a]\ncmd = echo a\n\n[b]\ncmd = echo b\nwait = a\n",
        );
        let task = materialize_task(file.path(), "b").unwrap();
        assert_eq!(task.cmd, "echo b");
        assert_eq!(task.wait.as_deref(), Some("a"));
        assert!(task.vars.is_empty());
    }

    #[test]
    fn other_keys_become_vars() {
        let file = workspace("[test]\ncmd = ./run_tests\nwait = build\nRUST_LOG = debug\n");
        let task = materialize_task(file.path(), "test").unwrap();
        assert_eq!(task.cmd, "./run_tests");
        assert_eq!(task.wait.as_deref(), Some("build"));
        assert_eq!(task.vars, vec!["RUST_LOG=debug".to_string()]);
    }

    #[test]
    fn missing_section_is_task_not_found() {
        let file = workspace("[build]\ncmd = make\n");
        let err = materialize_task(file.path(), "missing").unwrap_err();
        assert!(matches!(err, DpatchError::TaskNotFound(_)));
    }

    #[test]
    fn section_without_cmd_is_task_not_found() {
        let file = workspace("[empty]\ndir = /tmp\n");
        let err = materialize_task(file.path(), "empty").unwrap_err();
        assert!(matches!(err, DpatchError::TaskNotFound(_)));
    }

    #[test]
    fn continuation_lines_append_with_newline_separator() {
        let file = workspace("[build]\ncmd = echo one\n  echo two\n  echo three\n");
        let task = materialize_task(file.path(), "build").unwrap();
        assert_eq!(task.cmd, "echo one\necho two\necho three");
    }

    #[test]
    fn comment_lines_are_skipped_without_resetting_state() {
        let file = workspace("[build]\ncmd = echo one\n# a comment\n  echo two\n");
        let task = materialize_task(file.path(), "build").unwrap();
        assert_eq!(task.cmd, "echo one\necho two");
    }

    #[test]
    fn indented_comment_mid_continuation_is_not_appended() {
        let file = workspace("[build]\ncmd = echo one\n  # note\n  echo two\n");
        let task = materialize_task(file.path(), "build").unwrap();
        assert_eq!(task.cmd, "echo one\necho two");
    }

    #[test]
    fn key_with_no_equals_sign_becomes_empty_value() {
        let file = workspace("[build]\ncmd = make\nBARE_FLAG\n");
        let task = materialize_task(file.path(), "build").unwrap();
        assert_eq!(task.vars, vec!["BARE_FLAG=".to_string()]);
    }

    #[test]
    fn unreadable_path_is_workspace_unreadable() {
        let err = materialize_task(Path::new("/no/such/workspace.ini"), "build").unwrap_err();
        assert!(matches!(err, DpatchError::WorkspaceUnreadable(_)));
    }

    #[test]
    fn check_readable_passes_for_existing_file() {
        let file = workspace("[build]\ncmd = make\n");
        assert!(check_readable(file.path()).is_ok());
    }
}
