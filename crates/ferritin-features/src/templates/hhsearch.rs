//! Wrapper around the `hhsearch` binary.
use crate::error::{Error, Result};
use log::{debug, info};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone)]
pub struct HhSearch {
    pub binary: PathBuf,
    pub databases: Vec<PathBuf>,
    pub maxseq: usize,
}

impl HhSearch {
    pub fn new(binary: impl Into<PathBuf>, databases: Vec<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            databases,
            maxseq: 1_000_000,
        }
    }

    /// Search the `pdb70` database shipped in a downloaded template directory.
    pub fn for_template_dir(template_dir: &Path) -> Self {
        Self::new("hhsearch", vec![template_dir.join("pdb70")])
    }

    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            input.into(),
            "-o".into(),
            output.into(),
            "-maxseq".into(),
            self.maxseq.to_string().into(),
        ];
        for db in &self.databases {
            args.push("-d".into());
            args.push(db.into());
        }
        args
    }

    /// Run a search for `a3m` and return the `.hhr` text.
    pub fn query(&self, a3m: &str) -> Result<String> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("query.a3m");
        let output = workdir.path().join("output.hhr");
        fs::write(&input, a3m)?;

        info!("launching hhsearch against {:?}", self.databases);
        let result = Command::new(&self.binary)
            .args(self.args(&input, &output))
            .output()
            .map_err(|e| Error::HhSearch(format!("could not run {}: {}", self.binary.display(), e)))?;
        if !result.status.success() {
            return Err(Error::HhSearch(format!(
                "exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        debug!("hhsearch finished");
        Ok(fs::read_to_string(&output)?)
    }
}
