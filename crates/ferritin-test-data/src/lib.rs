//! ferritin-test-data
//!
//! A module to provide test files embedded in the crate for use in testing.
//! Small alignment, search and structure fixtures are included in the crate so the
//! pipeline crates can be exercised without network access or external binaries.
//!
//! The test files are represented as `TestFile` objects which package the raw binary data
//! and create temporary files (or named files inside a directory) for programs to operate on.
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

#[derive(Debug)]
/// Test File
///
/// Example usage:
///
/// ```ignore
/// // returns (filepath, _tempfile_handle).
/// // _handle ensures the tempfile remains in scope
/// use ferritin_test_data::TestFile;
/// let (a3m_file, _temp) = TestFile::msa_chain_a().create_temp().unwrap();
///
/// // or materialize a fixture under its canonical name inside a directory
/// let dir = tempfile::tempdir().unwrap();
/// TestFile::mmseqs_uniref().write_to(dir.path()).unwrap();
/// ```
pub struct TestFile {
    filebinary: &'static [u8],
    filename: &'static str,
    suffix: &'static str,
}

impl TestFile {
    /// UniProt-style A3M for a 6 residue chain (`ACDEFG`).
    /// Contains an insertion, a gap and a blank line.
    pub fn msa_chain_a() -> Self {
        Self {
            filebinary: include_bytes!("../data/msa/chain_a.a3m"),
            filename: "chain_a.a3m",
            suffix: "a3m",
        }
    }
    /// UniProt-style A3M for a 5 residue chain (`KLMNP`).
    pub fn msa_chain_b() -> Self {
        Self {
            filebinary: include_bytes!("../data/msa/chain_b.a3m"),
            filename: "chain_b.a3m",
            suffix: "a3m",
        }
    }
    /// User supplied alignment for `ACDEFG`.
    pub fn msa_custom() -> Self {
        Self {
            filebinary: include_bytes!("../data/msa/custom.a3m"),
            filename: "custom.a3m",
            suffix: "a3m",
        }
    }
    /// MMseqs2 server output for tags 101 (`ACDE`) and 102 (`GHIK`).
    /// Tag blocks are separated by NUL bytes the way the server writes them.
    pub fn mmseqs_uniref() -> Self {
        Self {
            filebinary: include_bytes!("../data/mmseqs/uniref.a3m"),
            filename: "uniref.a3m",
            suffix: "a3m",
        }
    }
    /// Environmental database hits for tags 101 and 102.
    pub fn mmseqs_env() -> Self {
        Self {
            filebinary: include_bytes!("../data/mmseqs/bfd.mgnify30.metaeuk30.smag30.a3m"),
            filename: "bfd.mgnify30.metaeuk30.smag30.a3m",
            suffix: "a3m",
        }
    }
    /// Template search table (`pdb70.m8`) for tags 101 and 102.
    pub fn mmseqs_pdb70_m8() -> Self {
        Self {
            filebinary: include_bytes!("../data/mmseqs/pdb70.m8"),
            filename: "pdb70.m8",
            suffix: "m8",
        }
    }
    /// HHsearch result with two hits against `ACDEFG`.
    pub fn hhr_01() -> Self {
        Self {
            filebinary: include_bytes!("../data/hhr/query.hhr"),
            filename: "query.hhr",
            suffix: "hhr",
        }
    }
    /// Backbone-only template structure `1abc`, chain A, sequence `MACDEFGH`.
    pub fn template_1abc() -> Self {
        Self {
            filebinary: include_bytes!("../data/structures/1abc.pdb"),
            filename: "1abc.pdb",
            suffix: "pdb",
        }
    }
    /// Single-chain query file.
    pub fn query_monomer() -> Self {
        Self {
            filebinary: include_bytes!("../data/queries/monomer.fasta"),
            filename: "monomer.fasta",
            suffix: "fasta",
        }
    }
    /// Three chain query (`ACDEFG:KLMNP:KLMNP`).
    pub fn query_complex() -> Self {
        Self {
            filebinary: include_bytes!("../data/queries/complex.fasta"),
            filename: "complex.fasta",
            suffix: "fasta",
        }
    }

    pub fn contents(&self) -> &'static str {
        std::str::from_utf8(self.filebinary).unwrap_or_default()
    }

    pub fn create_temp(&self) -> std::io::Result<(String, NamedTempFile)> {
        let temp = Builder::new()
            .suffix(&format!(".{}", self.suffix))
            .tempfile()?;

        fs::write(&temp, self.filebinary)?;
        let path = temp.path().to_string_lossy().into_owned();

        Ok((path, temp))
    }

    /// Write the fixture into `dir` under its canonical file name.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.filename);
        fs::write(&path, self.filebinary)?;
        Ok(path)
    }
}
