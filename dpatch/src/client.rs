//! The one-shot CLI client: connect, send one request frame, read one
//! response frame, close. If `-w` named a path, repeat that cycle
//! every time the watcher reports a change under it.
//!
//! Grounded on the original source's `client_eval_cmds`/`send_cmd`/
//! `poll_response`/`poll_watch` (`examples/original_source/src/client.h`):
//! same request/response/close shape and the same "re-issue on watched
//! change" loop, with `inotify` swapped for the cross-platform `notify`
//! crate.

use crate::config::{AppSettings, RunMode};
use dpatch_common::{DpatchError, Message, MessageKind, Token, TokenKind};
use notify::{RecursiveMode, Watcher};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::mpsc::channel;

/// Send the request described by `settings.run_mode`, then keep
/// re-sending it on every filesystem change under `settings.watch_path`
/// if one was given.
pub fn run(settings: &AppSettings) -> Result<(), DpatchError> {
    send_once(settings)?;

    if let Some(watch_path) = settings.watch_path.clone() {
        watch_and_resend(settings, &watch_path)?;
    }

    Ok(())
}

fn build_request(run_mode: &RunMode) -> Message<'_> {
    match run_mode {
        RunMode::Run { name, vars } => {
            let mut tokens = vec![Token::new(TokenKind::Arg, name.as_str())];
            tokens.extend(vars.iter().map(|v| Token::new(TokenKind::Var, v.as_str())));
            Message::new(MessageKind::TaskRun, tokens)
        }
        RunMode::Set { path } => Message::single(
            MessageKind::WorkspaceSet,
            path.to_str().unwrap_or_default(),
        ),
        RunMode::Server => unreachable!("client::run is only called for Run/Set modes"),
    }
}

fn send_once(settings: &AppSettings) -> Result<(), DpatchError> {
    let message = build_request(&settings.run_mode);
    let encoded = dpatch_common::encode(&message);

    if !settings.quiet {
        println!(
            "Sending command to dpatch server at port {}...",
            settings.port
        );
    }

    let addr = SocketAddr::new(settings.address, settings.port);
    let mut stream = TcpStream::connect_timeout(&addr, settings.sock_timeout)
        .map_err(|e| DpatchError::SendFailed(format!("connect to {}: {}", addr, e)))?;
    stream
        .set_read_timeout(Some(settings.sock_timeout))
        .map_err(|e| DpatchError::SendFailed(e.to_string()))?;

    stream
        .write_all(&encoded)
        .map_err(|e| DpatchError::SendFailed(e.to_string()))?;

    let mut buf = vec![0u8; settings.buffer_size];
    let n = stream.read(&mut buf).map_err(|e| {
        DpatchError::ReadFailed(format!("no response from server: {}", e))
    })?;
    if n == 0 {
        return Err(DpatchError::ReadFailed(
            "server closed the connection without responding".to_string(),
        ));
    }

    let response = dpatch_common::decode(&buf[..n])?;
    let payload = response.tokens.first().map(|t| t.value).unwrap_or("");

    if response.kind == MessageKind::Err {
        if !settings.quiet {
            eprintln!("Error: {}", payload);
        }
        return Err(DpatchError::ReadFailed(payload.to_string()));
    }

    if !settings.quiet {
        println!("Success: {}", payload);
    }
    Ok(())
}

fn watch_and_resend(settings: &AppSettings, watch_path: &Path) -> Result<(), DpatchError> {
    let (tx, rx) = channel();
    let mut watcher = notify::recommended_watcher(tx)
        .map_err(|e| DpatchError::Config(format!("failed to initialize file watcher: {}", e)))?;
    watcher
        .watch(watch_path, RecursiveMode::Recursive)
        .map_err(|e| {
            DpatchError::Config(format!(
                "failed to watch '{}': {}",
                watch_path.display(),
                e
            ))
        })?;

    for event in rx {
        match event {
            Ok(_) => {
                if let Err(e) = send_once(settings) {
                    log::warn!("resend after filesystem change failed: {}", e);
                }
            }
            Err(e) => log::warn!("watch error: {}", e),
        }
    }

    Ok(())
}
