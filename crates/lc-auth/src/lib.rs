//! Credential handling for log-cache clients.
//!
//! This crate owns the one piece of state shared between a streaming session
//! and the rest of the client: the access credential.
//!
//! - **Credential store**: single-writer, many-reader slot, replaced atomically
//! - **Claims**: unverified `exp` decoding of JWT access tokens
//! - **Refresher**: exchange of a refresh token at a UAA-style token endpoint
//! - **Scheduler**: background renewal at 90% of the token lifetime
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lc_auth::{Credential, CredentialStore, RefreshScheduler, TickSource, UaaRefresher};
//!
//! let store = CredentialStore::new(Credential::new(access).with_refresh_token(refresh));
//! let refresher = Arc::new(UaaRefresher::new("https://uaa.example.com")?);
//!
//! let mut handle = RefreshScheduler::new(refresher, store.clone())
//!     .start(TickSource::Timer)
//!     .await?;
//!
//! // ... hand `store` to every HTTP client ...
//!
//! if let Some(err) = handle.fatal().await {
//!     eprintln!("credential can no longer be renewed: {err}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod claims;
mod credential;
mod error;
mod refresher;
mod scheduler;

pub use credential::*;
pub use error::*;
pub use refresher::*;
pub use scheduler::*;
