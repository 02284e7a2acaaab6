//! ferritin-mmseqs
//!
//! Client for the MMseqs2 alignment server used to build MSAs and find templates.
//! A batch of sequences is deduplicated, submitted as one job and polled under a
//! [`RetryPolicy`]. The result archive is cached on disk and split back into one
//! alignment per input sequence.
//!
//! ```ignore
//! use ferritin_mmseqs::{HttpMsaService, MmseqsClient, MsaOptions};
//!
//! let client = MmseqsClient::new(HttpMsaService::public()?);
//! let sequences = vec!["ACDE".to_string(), "GHIK".to_string()];
//! let alignments = client.run(&sequences, "jobs/query".as_ref(), &MsaOptions::default())?;
//! ```
pub mod archive;
pub mod client;
pub mod demux;
pub mod error;
pub mod retry;
pub mod service;
pub mod status;

pub use client::{service_mode, MmseqsClient, MsaMode, MsaOptions, RawAlignment};
pub use error::{Error, Result};
pub use retry::{Clock, ManualClock, RetryPolicy, SystemClock};
pub use service::{HttpMsaService, MsaService, DEFAULT_HOST, DEFAULT_TEMPLATE_HOST};
pub use status::{StatusAction, Ticket, TicketStatus};
