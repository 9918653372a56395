//! The wire framing codec: token-stream messages over a byte stream.
//!
//! Every message is a 12-byte header followed by a run of tokens:
//!
//! ```text
//! [ total_length: i32 LE ][ kind: i32 LE ][ token_count: i32 LE ]
//! [ token_1_kind: u8 ][ token_1_value: NUL-terminated UTF-8 ] ...
//! ```
//!
//! `total_length` is the size of the whole frame, including its own four
//! bytes. Decoding never allocates: a decoded [`Token`] borrows its value
//! straight out of the input buffer, so it is only valid as long as that
//! buffer is.
//!
//! This codec treats one `read()` as one complete frame. It does not
//! buffer across reads and reassemble a message that spans more than one
//! read; a frame split across two reads is rejected as `InvalidFrame`.
//! See this repo's design notes.

use crate::errors::DpatchError;

const HEADER_LEN: usize = 12;

/// Closed set of message kinds carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// No meaningful kind; never sent, only used as a default/placeholder.
    None,
    /// Liveness probe.
    Ping,
    /// Generic acknowledgement.
    Ack,
    /// Request: run a task.
    TaskRun,
    /// Request: describe a task (reserved).
    TaskInfo,
    /// Request: change the active workspace.
    WorkspaceSet,
    /// Request: describe the active workspace (reserved).
    WorkspaceInfo,
    /// Request: describe live processes (reserved).
    ProcInfo,
    /// Fan-out: a line of a task's stdout.
    PrintOut,
    /// Fan-out: a line of a task's stderr.
    PrintErr,
    /// Fan-out: a task finished.
    TaskComplete,
    /// Response: request succeeded.
    Success,
    /// Response: request failed.
    Err,
}

impl MessageKind {
    fn to_i32(self) -> i32 {
        match self {
            MessageKind::None => 0,
            MessageKind::Ping => 1,
            MessageKind::Ack => 2,
            MessageKind::TaskRun => 3,
            MessageKind::TaskInfo => 4,
            MessageKind::WorkspaceSet => 5,
            MessageKind::WorkspaceInfo => 6,
            MessageKind::ProcInfo => 7,
            MessageKind::PrintOut => 8,
            MessageKind::PrintErr => 9,
            MessageKind::TaskComplete => 10,
            MessageKind::Success => 11,
            MessageKind::Err => 12,
        }
    }

    fn from_i32(value: i32) -> Result<Self, DpatchError> {
        Ok(match value {
            0 => MessageKind::None,
            1 => MessageKind::Ping,
            2 => MessageKind::Ack,
            3 => MessageKind::TaskRun,
            4 => MessageKind::TaskInfo,
            5 => MessageKind::WorkspaceSet,
            6 => MessageKind::WorkspaceInfo,
            7 => MessageKind::ProcInfo,
            8 => MessageKind::PrintOut,
            9 => MessageKind::PrintErr,
            10 => MessageKind::TaskComplete,
            11 => MessageKind::Success,
            12 => MessageKind::Err,
            other => {
                return Err(DpatchError::InvalidFrame(format!(
                    "unknown message kind {}",
                    other
                )))
            }
        })
    }
}

/// Closed set of token kinds. `None` tokens are skipped during encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Skipped silently at encode time.
    None,
    /// A positional argument (e.g. a task name).
    Arg,
    /// A `KEY=VALUE` environment override.
    Var,
}

impl TokenKind {
    fn to_u8(self) -> u8 {
        match self {
            TokenKind::None => 0,
            TokenKind::Arg => 1,
            TokenKind::Var => 2,
        }
    }

    fn from_u8(value: u8) -> Result<Self, DpatchError> {
        Ok(match value {
            0 => TokenKind::None,
            1 => TokenKind::Arg,
            2 => TokenKind::Var,
            other => {
                return Err(DpatchError::InvalidFrame(format!(
                    "unknown token kind {}",
                    other
                )))
            }
        })
    }
}

/// One typed string token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// What this token represents.
    pub kind: TokenKind,
    /// Its string payload.
    pub value: &'a str,
}

impl<'a> Token<'a> {
    /// Build a new token.
    pub fn new(kind: TokenKind, value: &'a str) -> Self {
        Token { kind, value }
    }
}

/// A decoded (or to-be-encoded) message: a kind plus its ordered tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<'a> {
    /// The message kind.
    pub kind: MessageKind,
    /// Ordered tokens, in wire order.
    pub tokens: Vec<Token<'a>>,
}

impl<'a> Message<'a> {
    /// Build a new message.
    pub fn new(kind: MessageKind, tokens: Vec<Token<'a>>) -> Self {
        Message { kind, tokens }
    }

    /// Convenience constructor for the common one-token response/fan-out
    /// shape (`Err "reason"`, `PrintOut "line"`, ...).
    pub fn single(kind: MessageKind, value: &'a str) -> Self {
        Message::new(kind, vec![Token::new(TokenKind::Arg, value)])
    }
}

/// Encode `message` into a fresh, length-prefixed frame.
///
/// Tokens whose kind is `TokenKind::None` are skipped, per §4.1.
pub fn encode(message: &Message<'_>) -> Vec<u8> {
    let live_tokens: Vec<&Token<'_>> = message
        .tokens
        .iter()
        .filter(|t| t.kind != TokenKind::None)
        .collect();

    let mut body = Vec::new();
    body.extend_from_slice(&message.kind.to_i32().to_le_bytes());
    body.extend_from_slice(&(live_tokens.len() as i32).to_le_bytes());
    for token in &live_tokens {
        body.push(token.kind.to_u8());
        body.extend_from_slice(token.value.as_bytes());
        body.push(0);
    }

    let total_length = (body.len() + 4) as i32;
    let mut frame = Vec::with_capacity(body.len() + 4);
    frame.extend_from_slice(&total_length.to_le_bytes());
    frame.extend_from_slice(&body);
    frame
}

/// Decode a complete frame out of `buf`.
///
/// Returns `InvalidFrame` if `token_count` < 1, if a value's NUL
/// terminator would run past the declared `total_length`, or if fewer
/// tokens than declared are actually present.
pub fn decode(buf: &[u8]) -> Result<Message<'_>, DpatchError> {
    if buf.len() < HEADER_LEN {
        return Err(DpatchError::InvalidFrame(
            "buffer shorter than the frame header".to_string(),
        ));
    }

    let total_length = i32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
    let kind = MessageKind::from_i32(i32::from_le_bytes(buf[4..8].try_into().unwrap()))?;
    let token_count = i32::from_le_bytes(buf[8..12].try_into().unwrap());

    if token_count < 1 {
        return Err(DpatchError::InvalidFrame(
            "token_count must be at least 1".to_string(),
        ));
    }
    if total_length > buf.len() {
        return Err(DpatchError::InvalidFrame(
            "declared total_length runs past the buffer".to_string(),
        ));
    }

    let mut tokens = Vec::with_capacity(token_count as usize);
    let mut pos = HEADER_LEN;
    for _ in 0..token_count {
        if pos >= total_length {
            return Err(DpatchError::InvalidFrame(
                "fewer tokens present than declared".to_string(),
            ));
        }
        let token_kind = TokenKind::from_u8(buf[pos])?;
        pos += 1;

        let remaining = &buf[pos..total_length];
        let nul_at = remaining.iter().position(|&b| b == 0).ok_or_else(|| {
            DpatchError::InvalidFrame("token value missing its NUL terminator".to_string())
        })?;
        let value = std::str::from_utf8(&remaining[..nul_at])
            .map_err(|_| DpatchError::InvalidFrame("token value is not valid UTF-8".to_string()))?;

        tokens.push(Token::new(token_kind, value));
        pos += nul_at + 1;
    }

    Ok(Message::new(kind, tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_matches_original_tokens() {
        // S1: kind=TaskRun, tokens [(Arg,"build"),(Var,"K=V")]
        let msg = Message::new(
            MessageKind::TaskRun,
            vec![
                Token::new(TokenKind::Arg, "build"),
                Token::new(TokenKind::Var, "K=V"),
            ],
        );
        let frame = encode(&msg);
        let decoded = decode(&frame).unwrap();

        assert_eq!(decoded.kind, MessageKind::TaskRun);
        assert_eq!(decoded.tokens.len(), 2);
        assert_eq!(decoded.tokens[0], Token::new(TokenKind::Arg, "build"));
        assert_eq!(decoded.tokens[1], Token::new(TokenKind::Var, "K=V"));
    }

    #[test]
    fn none_kind_tokens_are_skipped_on_encode() {
        let msg = Message::new(
            MessageKind::Ping,
            vec![
                Token::new(TokenKind::None, "dropped"),
                Token::new(TokenKind::Arg, "kept"),
            ],
        );
        let decoded = decode(&encode(&msg)).unwrap();
        assert_eq!(decoded.tokens.len(), 1);
        assert_eq!(decoded.tokens[0].value, "kept");
    }

    #[test]
    fn single_helper_builds_one_token() {
        let msg = Message::single(MessageKind::Err, "task not found: foo");
        let decoded = decode(&encode(&msg)).unwrap();
        assert_eq!(decoded.kind, MessageKind::Err);
        assert_eq!(decoded.tokens[0].value, "task not found: foo");
    }

    #[test]
    fn rejects_zero_token_count() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&12i32.to_le_bytes());
        frame.extend_from_slice(&(MessageKind::Ping.to_i32()).to_le_bytes());
        frame.extend_from_slice(&0i32.to_le_bytes());
        assert!(matches!(decode(&frame), Err(DpatchError::InvalidFrame(_))));
    }

    #[test]
    fn rejects_truncated_total_length() {
        let msg = Message::single(MessageKind::Ack, "hello");
        let mut frame = encode(&msg);
        // Claim a total_length far beyond what's actually present.
        let bogus = (frame.len() as i32) + 100;
        frame[0..4].copy_from_slice(&bogus.to_le_bytes());
        assert!(matches!(decode(&frame), Err(DpatchError::InvalidFrame(_))));
    }

    #[test]
    fn rejects_buffer_shorter_than_header() {
        assert!(matches!(decode(&[1, 2, 3]), Err(DpatchError::InvalidFrame(_))));
    }

    #[test]
    fn rejects_fewer_tokens_than_declared() {
        let msg = Message::single(MessageKind::Ack, "only one");
        let mut frame = encode(&msg);
        // Declare two tokens while only one is actually encoded.
        frame[8..12].copy_from_slice(&2i32.to_le_bytes());
        assert!(matches!(decode(&frame), Err(DpatchError::InvalidFrame(_))));
    }
}
