//! Content negotiation subsystem.
//!
//! # Data Flow
//! ```text
//! Response headers
//!     → types.rs (parse "type;version=n" content-type value)
//!     → negotiate.rs (classify against the caller's expected type)
//!     → ok / exception / error verdict for the dispatch loop
//! ```
//!
//! # Design Decisions
//! - Version comparison is a forward-compatibility rule: a client that
//!   declares version V accepts any server response at version <= V
//! - The exception marker type short-circuits negotiation entirely

pub mod negotiate;
pub mod types;

pub use negotiate::{classify, Classification, EXCEPTION_CONTENT_TYPE};
pub use types::ContentType;
