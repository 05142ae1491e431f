#![forbid(unsafe_code)]

//! # capstan-net
//!
//! HTTP transport for the update agent: a thin client over `reqwest` with
//! explicit status handling, plus the [`TokenSource`] seam through which
//! bearer credentials for the artifact store are obtained.
//!
//! ## Public contract
//!
//! [`HttpClient`] is the transport used by every other crate in the
//! workspace. [`TokenSource`] is the pluggable credential interface; the
//! OAuth exchange that produces tokens lives outside this workspace.

pub mod client;
pub mod error;
pub mod token;
pub mod types;

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

pub use client::HttpClient;
pub use error::{NetError, NetResult};
pub use token::{FileTokenSource, StaticTokenSource, TokenSource};
pub use types::{Headers, NetOptions};

/// Streaming response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = NetResult<Bytes>> + Send>>;
