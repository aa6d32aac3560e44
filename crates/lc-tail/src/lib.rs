//! Live tailing of application logs from log cache.
//!
//! Log cache is an eventually consistent store queried by time range. This
//! crate turns repeated range queries into an ordered, duplicate-free stream:
//!
//! - **Fetcher**: [`LogCacheClient`] issues one read per call ([`EnvelopeSource`])
//! - **Seek**: find the newest stored timestamp, waiting while there is none
//! - **Poll**: query from a [`Cursor`] past the last delivered envelope
//! - **Session**: [`tail`] runs seek and poll in a background task
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lc_tail::{LogCacheClient, TailConfig, tail};
//!
//! let config = TailConfig::default();
//! let client = LogCacheClient::new(url, credentials, config.request_timeout())?;
//! let mut session = tail(Arc::new(client), app_guid, &config);
//!
//! while let Some(envelope) = session.envelopes.recv().await {
//!     println!("{}", envelope.message());
//! }
//! if let Ok(err) = session.errors.try_recv() {
//!     eprintln!("tail stopped: {err}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod envelope;
mod error;
mod poll;
mod query;
mod seek;
mod tail;

pub use client::*;
pub use config::*;
pub use envelope::*;
pub use error::*;
pub use poll::*;
pub use query::*;
pub use seek::*;
pub use tail::*;
