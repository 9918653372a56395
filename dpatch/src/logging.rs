//! Logging initialization: an `env_logger` instance fed by a writer that
//! tees to stdout (unless `-q`) and an optional `-l` log file, mirroring
//! the original source's simultaneous stdout+file sink.

use crate::config::AppSettings;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};

struct Tee {
    stdout: Option<io::Stdout>,
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(stdout) = self.stdout.as_mut() {
            stdout.write_all(buf)?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(stdout) = self.stdout.as_mut() {
            stdout.flush()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Initialize the global logger at `settings.verbosity`, filtered to
/// `crate_name`'s own modules (so a dependency's chatter at the same
/// level doesn't flood the log).
pub fn init(settings: &AppSettings, crate_name: &str) -> io::Result<()> {
    let top_level_module = crate_name.split("::").next().unwrap_or(crate_name);

    let file = match &settings.log_file {
        Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
        None => None,
    };
    let stdout = if settings.quiet { None } else { Some(io::stdout()) };

    let tee = Tee { stdout, file };

    env_logger::Builder::from_default_env()
        .filter(Some(top_level_module), settings.verbosity)
        .target(env_logger::Target::Pipe(Box::new(tee)))
        .init();

    Ok(())
}
