//! Logging setup
//!
//! The daemon mirrors every record to stderr and to a log file in the user
//! state directory. Client subcommands use the plain env_logger default.

use crate::config;
use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::io::Write;

/// Writer that fans each record out to stderr and the log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()?;
        self.file.flush()
    }
}

/// Initialize daemon logging: stderr + `$XDG_STATE_HOME/voicetyped/voicetyped.log`.
pub fn init_daemon_logging() -> Result<()> {
    let dir = config::state_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("voicetyped.log"))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {} {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or("?"),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(Tee { file })))
        .init();
    Ok(())
}

/// Initialize client logging: plain stderr.
pub fn init_client_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}
