//! Connection leasing.
//!
//! # Data Flow
//! ```text
//! dispatch asks pool.acquire()
//!     → http.rs (reuse an idle hyper HTTP/1.1 connection or dial)
//!     → ConnectionHandle leased to exactly one exchange
//!     → release(dispose) returns or closes it, exactly once
//! ```
//!
//! # Design Decisions
//! - The pool itself is an external collaborator: sizing, eviction and
//!   balancing policy live behind the trait, not here
//! - A handle dropped without an explicit release counts as a dispose,
//!   so a panicking or short-circuiting exchange can never leak a lease

pub mod http;

use async_trait::async_trait;
use hyper::{Request, Response, Uri};

use crate::transport::{RemotingBody, ResponseBody, TransportError};

pub use self::http::HttpConnectionPool;

/// One leased transport connection.
#[async_trait]
pub trait Connection: Send {
    /// Target this connection is bound to.
    fn uri(&self) -> &Uri;

    /// Send one request and wait for the response head; the body streams
    /// behind it.
    async fn send(
        &mut self,
        request: Request<RemotingBody>,
    ) -> Result<Response<ResponseBody>, TransportError>;

    /// Whether the connection can still carry requests.
    fn is_open(&self) -> bool {
        true
    }
}

type ReclaimFn = Box<dyn FnOnce(Box<dyn Connection>, bool) + Send>;

/// Exclusive lease of a connection for the duration of one exchange.
///
/// `release` consumes the handle; call sites therefore cannot release
/// twice, and `Drop` disposes anything never released.
pub struct ConnectionHandle {
    uri: Uri,
    conn: Option<Box<dyn Connection>>,
    reclaim: Option<ReclaimFn>,
}

impl ConnectionHandle {
    /// Wrap a leased connection with the pool's reclaim hook.
    pub fn new(
        conn: Box<dyn Connection>,
        reclaim: impl FnOnce(Box<dyn Connection>, bool) + Send + 'static,
    ) -> Self {
        Self {
            uri: conn.uri().clone(),
            conn: Some(conn),
            reclaim: Some(Box::new(reclaim)),
        }
    }

    /// Target URI of the leased connection.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Send one request over the leased connection.
    pub async fn send(
        &mut self,
        request: Request<RemotingBody>,
    ) -> Result<Response<ResponseBody>, TransportError> {
        match self.conn.as_mut() {
            Some(conn) => conn.send(request).await,
            None => Err(TransportError::Released),
        }
    }

    /// Return the connection to its pool. `dispose = true` closes it;
    /// `false` offers it for reuse.
    pub fn release(mut self, dispose: bool) {
        if let (Some(conn), Some(reclaim)) = (self.conn.take(), self.reclaim.take()) {
            reclaim(conn, dispose);
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let (Some(conn), Some(reclaim)) = (self.conn.take(), self.reclaim.take()) {
            tracing::debug!(uri = %self.uri, "connection handle dropped without release, disposing");
            reclaim(conn, true);
        }
    }
}

/// Source of leased connections for one target.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Lease a connection. `eager` requests a fresh physical connection
    /// even when an idle one could be reused.
    async fn acquire(&self, eager: bool) -> Result<ConnectionHandle, TransportError>;

    /// Base URI of the target this pool serves.
    fn uri(&self) -> &Uri;
}
