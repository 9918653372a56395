//! Shared building blocks for the dpatch agent and its CLI client: the
//! wire framing codec, the fixed-capacity slot store, and the closed
//! error type both sides use to talk about what went wrong.

#![deny(missing_docs)]

pub mod config;
pub mod errors;
pub mod protocol;
pub mod store;

pub use crate::config::MergeOptions;
pub use crate::errors::DpatchError;
pub use crate::protocol::{decode, encode, Message, MessageKind, Token, TokenKind};
pub use crate::store::Store;
