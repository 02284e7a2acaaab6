//! Log to stderr and, once the output directory is known, to `prediction.log`.
use anyhow::Result;
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

pub const LOG_FILE: &str = "prediction.log";

struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Install the global logger with `info` as the default level.
///
/// With an output directory the log is also appended to `{output_dir}/prediction.log`.
/// Only the first call installs a logger; later calls keep it and warn when their
/// log file will stay empty.
pub fn init(output_dir: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(dir) = output_dir {
        fs::create_dir_all(dir)?;
        let file = File::options()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
    }
    if let Err(e) = builder.try_init() {
        match output_dir {
            Some(dir) => warn!(
                "logger already installed, {} will not receive log output: {}",
                dir.join(LOG_FILE).display(),
                e
            ),
            None => debug!("logger already installed: {}", e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        init(Some(first.path())).unwrap();
        init(Some(second.path())).unwrap();
        init(None).unwrap();
        assert!(first.path().join(LOG_FILE).exists());
        assert!(second.path().join(LOG_FILE).exists());
    }
}
