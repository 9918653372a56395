//! Background detachment (`-d`).
//!
//! Process daemonization is named in scope only as an external
//! collaborator (§1); the core event loop doesn't care whether it runs
//! attached to a terminal or not. This is the standard double-fork
//! daemonize so `-d` is not a silent no-op: fork, let the parent exit,
//! `setsid` to drop the controlling terminal, fork again so the daemon
//! can never reacquire one, then move to `/` and point stdio at
//! `/dev/null`.

use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{chdir, close, dup2, fork, setsid, ForkResult};

/// Detach the current process into the background.
///
/// Only the final grandchild returns from this call; both intermediate
/// parents call `std::process::exit(0)` immediately after forking.
pub fn daemonize() -> nix::Result<()> {
    // SAFETY: called at startup, before any threads are spawned and
    // before the event loop opens any file descriptor this fork would
    // need to duplicate or lose.
    match unsafe { fork() }? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    setsid()?;

    match unsafe { fork() }? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    chdir("/")?;
    redirect_standard_fds()
}

fn redirect_standard_fds() -> nix::Result<()> {
    let dev_null = open("/dev/null", OFlag::O_RDWR, Mode::empty())?;
    dup2(dev_null, 0)?;
    dup2(dev_null, 1)?;
    dup2(dev_null, 2)?;
    if dev_null > 2 {
        close(dev_null)?;
    }
    Ok(())
}
