//! Batched MSA and template search against an MMseqs2 server.
use crate::archive::{extract_tar_gz, invalidate_if_stale, CacheLock, ARCHIVE_NAME};
use crate::demux::{parse_m8, split_a3m_by_tag};
use crate::error::{Error, Result};
use crate::retry::{Clock, RetryPolicy, SystemClock};
use crate::service::MsaService;
use crate::status::{StatusAction, Ticket};
use itertools::Itertools;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const FIRST_TAG: usize = 101;
const UNIREF_A3M: &str = "uniref.a3m";
const ENV_A3M: &str = "bfd.mgnify30.metaeuk30.smag30.a3m";
const TEMPLATE_TABLE: &str = "pdb70.m8";

/// Where alignments come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MsaMode {
    /// No search; every sequence is its own one-row alignment.
    SingleSequence,
    /// UniRef only.
    MMseqs2Uniref,
    /// UniRef plus environmental databases.
    #[default]
    MMseqs2UnirefEnv,
}

impl MsaMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MsaMode::SingleSequence => "single_sequence",
            MsaMode::MMseqs2Uniref => "MMseqs2-U",
            MsaMode::MMseqs2UnirefEnv => "MMseqs2-U+E",
        }
    }

    pub fn use_env(&self) -> bool {
        matches!(self, MsaMode::MMseqs2UnirefEnv)
    }
}

impl fmt::Display for MsaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MsaMode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "single_sequence" => Ok(MsaMode::SingleSequence),
            "MMseqs2-U" => Ok(MsaMode::MMseqs2Uniref),
            "MMseqs2-U+E" => Ok(MsaMode::MMseqs2UnirefEnv),
            other => Err(format!("unknown MSA mode '{}'", other)),
        }
    }
}

/// Server side database selection.
pub fn service_mode(use_env: bool, use_filter: bool) -> &'static str {
    match (use_env, use_filter) {
        (true, true) => "env",
        (false, true) => "all",
        (true, false) => "env-nofilter",
        (false, false) => "nofilter",
    }
}

#[derive(Debug, Clone)]
pub struct MsaOptions {
    pub mode: MsaMode,
    pub use_filter: bool,
    pub use_templates: bool,
    /// Number of ranked template ids fetched per sequence.
    pub num_templates: usize,
}

impl Default for MsaOptions {
    fn default() -> Self {
        Self {
            mode: MsaMode::default(),
            use_filter: true,
            use_templates: false,
            num_templates: 20,
        }
    }
}

/// Alignment text and template location for one query sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAlignment {
    pub a3m: String,
    pub template_dir: Option<PathBuf>,
}

impl RawAlignment {
    pub fn single_sequence(sequence: &str) -> Self {
        Self {
            a3m: format!(">1\n{}\n", sequence),
            template_dir: None,
        }
    }
}

pub struct MmseqsClient<S, C = SystemClock> {
    service: S,
    clock: C,
    policy: RetryPolicy,
}

impl<S: MsaService> MmseqsClient<S, SystemClock> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            clock: SystemClock,
            policy: RetryPolicy::default(),
        }
    }
}

impl<S: MsaService, C: Clock> MmseqsClient<S, C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> MmseqsClient<S, C2> {
        MmseqsClient {
            service: self.service,
            clock,
            policy: self.policy,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Fetch alignments for `sequences`, returned in input order.
    ///
    /// Duplicated sequences are searched once and share their result. Results are
    /// cached in `{prefix}_{mode}`; a rerun with the same query reuses the archive
    /// and extracted files without contacting the server.
    pub fn run(
        &self,
        sequences: &[String],
        prefix: &Path,
        options: &MsaOptions,
    ) -> Result<Vec<RawAlignment>> {
        if options.mode == MsaMode::SingleSequence {
            return Ok(sequences
                .iter()
                .map(|seq| RawAlignment::single_sequence(seq))
                .collect());
        }

        let unique: Vec<&str> = sequences
            .iter()
            .map(String::as_str)
            .sorted()
            .dedup()
            .collect();
        let tag_of: BTreeMap<&str, usize> = unique
            .iter()
            .enumerate()
            .map(|(rank, seq)| (*seq, FIRST_TAG + rank))
            .collect();
        let query: String = unique
            .iter()
            .enumerate()
            .map(|(rank, seq)| format!(">{}\n{}\n", FIRST_TAG + rank, seq))
            .collect();

        let mode = service_mode(options.mode.use_env(), options.use_filter);
        let out_dir = PathBuf::from(format!("{}_{}", prefix.display(), mode));
        let _lock = CacheLock::acquire(&out_dir)?;
        invalidate_if_stale(&out_dir, &query)?;

        let archive = out_dir.join(ARCHIVE_NAME);
        if archive.exists() {
            info!("reusing cached MMseqs2 results in {}", out_dir.display());
        } else {
            info!(
                "submitting {} unique sequences to MMseqs2 (mode={})",
                unique.len(),
                mode
            );
            let id = self.wait_for_ticket(&query, mode)?;
            let partial = out_dir.join(format!("{}.part", ARCHIVE_NAME));
            self.service.download(&id, &partial)?;
            fs::rename(&partial, &archive)?;
        }
        if !out_dir.join(UNIREF_A3M).exists() {
            extract_tar_gz(&archive, &out_dir)?;
        }

        let template_dirs = if options.use_templates {
            self.fetch_templates(&out_dir, options.num_templates)?
        } else {
            BTreeMap::new()
        };

        let mut a3m_files = vec![UNIREF_A3M];
        if options.mode.use_env() {
            a3m_files.push(ENV_A3M);
        }
        let mut blocks: BTreeMap<usize, String> = BTreeMap::new();
        for name in a3m_files {
            let text = fs::read_to_string(out_dir.join(name))?;
            for (tag, block) in split_a3m_by_tag(&text, name)? {
                blocks.entry(tag).or_default().push_str(&block);
            }
        }

        sequences
            .iter()
            .map(|seq| {
                let tag = tag_of[seq.as_str()];
                let a3m = blocks
                    .get(&tag)
                    .filter(|block| !block.is_empty())
                    .cloned()
                    .ok_or(Error::MissingTag(tag))?;
                Ok(RawAlignment {
                    a3m,
                    template_dir: template_dirs.get(&tag).cloned(),
                })
            })
            .collect()
    }

    /// Submit the query and poll until the server reports completion. Returns the ticket id.
    fn wait_for_ticket(&self, query: &str, mode: &str) -> Result<String> {
        let mut backoff = self.policy.start(&self.clock);

        let mut ticket: Ticket = self.service.submit(query, mode)?;
        loop {
            match ticket.status.action() {
                StatusAction::Retry => {
                    debug!("submission returned {:?}, resubmitting", ticket.status);
                    backoff.wait()?;
                    ticket = self.service.submit(query, mode)?;
                }
                StatusAction::Fatal => return Err(Error::Service),
                StatusAction::Wait | StatusAction::Success => break,
            }
        }

        let id = ticket.id.clone().ok_or(Error::MissingTicketId)?;
        loop {
            match ticket.status.action() {
                StatusAction::Success => return Ok(id),
                StatusAction::Fatal => return Err(Error::Service),
                StatusAction::Retry | StatusAction::Wait => {
                    debug!("ticket {} is {:?}", id, ticket.status);
                    backoff.wait()?;
                    ticket = self.service.status(&id)?;
                }
            }
        }
    }

    /// Materialize one template directory per query tag with hits in `pdb70.m8`.
    ///
    /// Each bundle is unpacked into `templates_{tag}.part` and only renamed to
    /// `templates_{tag}` once complete, so an interrupted or corrupt download is
    /// fetched again on the next run.
    fn fetch_templates(
        &self,
        out_dir: &Path,
        num_templates: usize,
    ) -> Result<BTreeMap<usize, PathBuf>> {
        let table = fs::read_to_string(out_dir.join(TEMPLATE_TABLE))?;
        let hits = parse_m8(&table, TEMPLATE_TABLE)?;
        let mut dirs = BTreeMap::new();
        for (tag, ids) in hits {
            let dir = out_dir.join(format!("templates_{}", tag));
            if !dir.exists() {
                let ids: Vec<String> = ids.into_iter().take(num_templates).collect();
                info!("fetching {} templates for query {}", ids.len(), tag);
                let staging = out_dir.join(format!("templates_{}.part", tag));
                if staging.exists() {
                    warn!("discarding incomplete template download {}", staging.display());
                    fs::remove_dir_all(&staging)?;
                }
                let bundle = out_dir.join(format!("templates_{}.tar.gz", tag));
                self.service.download_templates(&ids, &bundle)?;
                extract_tar_gz(&bundle, &staging)?;
                fs::remove_file(&bundle)?;
                let a3m_index = staging.join("pdb70_a3m.ffindex");
                if a3m_index.exists() {
                    fs::copy(&a3m_index, staging.join("pdb70_cs219.ffindex"))?;
                } else {
                    warn!("template bundle for query {} has no pdb70_a3m.ffindex", tag);
                }
                fs::write(staging.join("pdb70_cs219.ffdata"), "")?;
                fs::rename(&staging, &dir)?;
            }
            dirs.insert(tag, dir);
        }
        Ok(dirs)
    }
}
