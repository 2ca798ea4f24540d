//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Caller-built request
//!     → target.rs decorate (session cookie, authorization, host)
//!     → transport send (payload marshalled off the I/O path)
//!     → content negotiation classifies the response
//!     → exception decode / result body / error
//!     → connection released with a reuse-or-dispose verdict
//! ```
//!
//! # Design Decisions
//! - One async function owns all terminal branches, so every exit path
//!   releases the leased connection exactly once
//! - Dispatch returns `Result`; the caller's success and failure handling
//!   are ordinary control flow at the await site
//! - Affinity probe failures are logged and absorbed, never surfaced to
//!   the exchange that triggered the acquisition

pub mod target;

pub use target::{DispatchError, InvocationResult, TargetContext};
