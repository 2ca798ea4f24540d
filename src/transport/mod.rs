//! Wire-level request and response plumbing.
//!
//! # Data Flow
//! ```text
//! dispatch builds http::Request<RemotingBody>
//!     → body.rs (serialized payload streamed off the I/O path)
//!     → Connection::send over the leased transport
//!     → http::Response<ResponseBody> back to dispatch
//! ```
//!
//! # Design Decisions
//! - Request serialization runs on the blocking thread pool: a slow
//!   marshaller must never stall the connection driver task
//! - Response bodies are boxed `http_body` bodies so transports other
//!   than the built-in hyper pool can slot in behind the traits

pub mod body;

use std::io;

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use thiserror::Error;

pub use body::{spawn_marshaller, BodyWriter, MarshalledBody, RemotingBody};

/// Type-erased response body: `Bytes` frames with I/O errors.
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

/// Transport-level failures. Always fatal to the exchange; the connection
/// they occurred on is disposed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The target URI cannot be dialed.
    #[error("invalid target {0}")]
    InvalidTarget(String),

    /// TCP connect failed.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// HTTP handshake on a fresh connection failed.
    #[error("handshake with {addr} failed: {reason}")]
    Handshake { addr: String, reason: String },

    /// Sending the request or receiving the response head failed.
    #[error("request failed: {0}")]
    Request(String),

    /// Reading the response body failed.
    #[error("reading response body failed: {0}")]
    Body(#[source] io::Error),

    /// The handle was already released back to the pool.
    #[error("connection already released")]
    Released,
}

/// Collect a response body into one buffer.
pub async fn collect_body(body: ResponseBody) -> Result<Bytes, TransportError> {
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(TransportError::Body)
}

/// Read a response body to its end, discarding the data.
pub async fn drain_body(mut body: ResponseBody) -> Result<(), TransportError> {
    while let Some(frame) = body.frame().await {
        frame.map_err(TransportError::Body)?;
    }
    Ok(())
}
