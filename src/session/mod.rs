//! Sticky-session state.
//!
//! # Data Flow
//! ```text
//! First caller needing affinity
//!     → affinity.rs begin_acquire (CAS, at most one probe in flight)
//!     → dispatch issues the probe; Set-Cookie scan caches the identifier
//!     → complete() fires the latch; all waiters observe the same id
//! ```
//!
//! # Design Decisions
//! - Last response processed wins the cached identifier (documented race)
//! - The latch is replaced, never reused, on clear(), so waiters parked on
//!   a superseded acquisition still unblock exactly once
//! - Waiting has no timeout, matching the wire contract this client
//!   implements

pub mod affinity;

pub use affinity::SessionAffinity;
