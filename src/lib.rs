//! Client-side protocol core for HTTP-transported remote invocation.
//!
//! Given a leased transport connection and a prepared request, this crate
//! attaches authentication and session-affinity metadata, streams the
//! serialized request payload, classifies the response by content type,
//! decodes remote-exception payloads, and reports a reuse/dispose verdict
//! for the connection back to the pool.
//!
//! The generic object codec, the credential source, and the connection
//! pool are all consumed through narrow traits; a minimal HTTP/1.1 pool
//! built on hyper is provided for callers that do not bring their own.

pub mod auth;
pub mod codec;
pub mod config;
pub mod content;
pub mod dispatch;
pub mod pool;
pub mod session;
pub mod transport;

pub use config::TargetConfig;
pub use content::ContentType;
pub use dispatch::{DispatchError, InvocationResult, TargetContext};
pub use pool::{ConnectionHandle, ConnectionPool};
