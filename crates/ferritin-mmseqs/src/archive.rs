//! Result archives and the on-disk cache directory.
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const ARCHIVE_NAME: &str = "out.tar.gz";
pub const MANIFEST_NAME: &str = "query.fasta";
const LOCK_NAME: &str = ".lock";

/// Unpack a gzipped tarball into `destination`.
pub fn extract_tar_gz(archive: &Path, destination: &Path) -> Result<()> {
    debug!("extracting {} into {}", archive.display(), destination.display());
    fs::create_dir_all(destination)?;
    let decoder = GzDecoder::new(BufReader::new(File::open(archive)?));
    let mut tar = tar::Archive::new(decoder);
    tar.unpack(destination)?;
    Ok(())
}

/// Exclusive claim on a cache directory. Released when dropped.
///
/// The lock file holds the id of the owning process. A run killed before the
/// drop leaves it behind; the error names the file so it can be removed by hand.
#[derive(Debug)]
pub struct CacheLock {
    path: PathBuf,
}

impl CacheLock {
    pub fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_NAME);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let lock = Self { path };
                write!(file, "{}", std::process::id())?;
                Ok(lock)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path)
                    .ok()
                    .and_then(|pid| pid.trim().parse::<u32>().ok())
                    .map_or_else(|| "an unknown process".to_string(), |pid| format!("process {}", pid));
                Err(Error::CacheLocked { lock: path, holder })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("could not release {}: {}", self.path.display(), e);
        }
    }
}

/// A cache directory stays valid only for the exact query it was built from.
///
/// When the recorded query differs, the cached archive and extracted files are
/// removed so the next run fetches fresh results.
pub fn invalidate_if_stale(dir: &Path, query: &str) -> Result<()> {
    let manifest = dir.join(MANIFEST_NAME);
    let stale = match fs::read_to_string(&manifest) {
        Ok(recorded) => recorded != query,
        Err(e) if e.kind() == ErrorKind::NotFound => dir.join(ARCHIVE_NAME).exists(),
        Err(e) => return Err(e.into()),
    };
    if stale {
        warn!("discarding stale MMseqs2 cache in {}", dir.display());
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.file_name().is_some_and(|name| name == LOCK_NAME) {
                continue;
            }
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
    }
    fs::write(&manifest, query)?;
    Ok(())
}
