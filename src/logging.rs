//! Logging setup for the broker binary: the default `env_logger` sink plus
//! a second file sink mirroring every event into `<workspace>/broker.log`,
//! so an operator tailing the workspace sees the same stream as the
//! terminal.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use log::{Log, Metadata, Record};

/// Forwards every record to an `env_logger`-formatted stderr sink and to a
/// plain-text `broker.log` file, so an operator watching the terminal and
/// an external observer tailing the workspace both see the same events.
struct TeeLogger {
    stderr: env_logger::Logger,
    file: Mutex<File>,
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.stderr.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.stderr.log(record);
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(
                file,
                "{} [{}] [{}]: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.target(),
                record.level(),
                record.args(),
            );
        }
    }

    fn flush(&self) {
        self.stderr.flush();
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

/// Install the tee'd logger. Must be called at most once per process,
/// before the campaign starts.
pub fn init(workspace: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(workspace)?;
    let stderr = env_logger::Builder::from_default_env().build();
    let max_level = stderr.filter();
    let file = OpenOptions::new().create(true).append(true).open(workspace.join("broker.log"))?;
    let logger = TeeLogger {
        stderr,
        file: Mutex::new(file),
    };
    log::set_max_level(max_level);
    let _ = log::set_boxed_logger(Box::new(logger));
    Ok(())
}
