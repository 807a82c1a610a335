//! Authenticated, resilient API access for embedded mini-app clients: deduplicated
//! credential exchange, transparent 401 recovery, and bounded retries in one crate.
//!
//! The crate is organized leaves first:
//!
//! - [`error`] classifies every failure into a closed [`error::ErrorKind`] set.
//! - [`store`] caches the persisted [`auth::Credential`] in front of a host secret store.
//! - [`token`] owns the in-memory credential and guarantees a single in-flight exchange.
//! - [`client`] issues bearer requests, recovers from 401s, and retries transient failures.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod obs;
pub mod store;
pub mod token;

mod _prelude {
	pub use std::{
		collections::VecDeque,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::{Arc, Weak},
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{ClassifiedError, ErrorKind, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
