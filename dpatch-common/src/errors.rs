//! The closed error taxonomy shared by the server and the client.

use thiserror::Error;

/// Everything that can go wrong while running or talking to a dpatch agent.
#[derive(Debug, Error)]
pub enum DpatchError {
    /// A decoded token stream violated the framing contract.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// A request carried a message kind the dispatcher does not recognize.
    #[error("Invalid command")]
    UnknownRequest,

    /// No workspace section matched the requested task name, or the
    /// matching section had no `cmd`.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// The workspace file could not be opened or read.
    #[error("workspace unreadable: {0}")]
    WorkspaceUnreadable(String),

    /// A fixed-capacity slot store had no free slot left.
    #[error("{0}")]
    StoreFull(String),

    /// Spawning the task's shell child failed.
    #[error("failed to launch task: {0}")]
    ForkFailed(String),

    /// Creating or configuring a pipe failed.
    #[error("pipe setup failed: {0}")]
    PipeFailed(String),

    /// Writing a framed message to a socket failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Accepting a new connection on the listen socket failed.
    #[error("accept failed: {0}")]
    AcceptFailed(String),

    /// Reading a framed message from a socket failed.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// Writing to a socket failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A bounded wait exceeded its budget without becoming ready.
    #[error("timed out")]
    Timeout,

    /// An I/O failure outside the closed taxonomy above (config/workspace
    /// file access, mostly, not the request path).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid UTF-8 encountered while parsing a workspace file or a CLI
    /// argument. The wire codec itself never surfaces this; invalid UTF-8
    /// on the wire is an `InvalidFrame`.
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Configuration failed validation (conflicting or out-of-range
    /// settings). Not part of the wire taxonomy; this never reaches a
    /// client, only the startup log and the process exit code.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DpatchError {
    /// A short, stable machine-readable label for this error kind.
    pub fn as_kind(&self) -> &'static str {
        match self {
            DpatchError::InvalidFrame(_) => "invalid_frame",
            DpatchError::UnknownRequest => "unknown_request",
            DpatchError::TaskNotFound(_) => "task_not_found",
            DpatchError::WorkspaceUnreadable(_) => "workspace_unreadable",
            DpatchError::StoreFull(_) => "store_full",
            DpatchError::ForkFailed(_) => "fork_failed",
            DpatchError::PipeFailed(_) => "pipe_failed",
            DpatchError::SendFailed(_) => "send_failed",
            DpatchError::AcceptFailed(_) => "accept_failed",
            DpatchError::ReadFailed(_) => "read_failed",
            DpatchError::WriteFailed(_) => "write_failed",
            DpatchError::Timeout => "timeout",
            DpatchError::Io(_) => "io",
            DpatchError::Utf8(_) => "utf8",
            DpatchError::Config(_) => "config",
        }
    }

    /// The human-readable payload to put in an `Err` response's single
    /// string token.
    pub fn as_wire_message(&self) -> String {
        format!("{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_message_includes_context() {
        let err = DpatchError::TaskNotFound("does_not_exist".to_string());
        assert!(err.as_wire_message().contains("does_not_exist"));
        assert_eq!(err.as_kind(), "task_not_found");
    }

    #[test]
    fn unknown_request_matches_original_wording() {
        let err = DpatchError::UnknownRequest;
        assert_eq!(err.as_wire_message(), "Invalid command");
    }
}
