//! Minimal HTTP/1.1 connection pool built on hyper.

use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use http_body_util::BodyExt;
use hyper::client::conn::http1;
use hyper::{Request, Response, Uri};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::pool::{Connection, ConnectionHandle, ConnectionPool};
use crate::transport::{RemotingBody, ResponseBody, TransportError};

/// Keep-alive pool of HTTP/1.1 connections to one target.
///
/// Released connections flow back through an unbounded channel; `acquire`
/// drains it, skipping connections the peer has since closed. No sizing,
/// eviction or health policy.
pub struct HttpConnectionPool {
    uri: Uri,
    returns_tx: mpsc::UnboundedSender<Box<dyn Connection>>,
    returns_rx: Mutex<mpsc::UnboundedReceiver<Box<dyn Connection>>>,
}

impl HttpConnectionPool {
    pub fn new(uri: Uri) -> Self {
        let (returns_tx, returns_rx) = mpsc::unbounded_channel();
        Self {
            uri,
            returns_tx,
            returns_rx: Mutex::new(returns_rx),
        }
    }

    fn take_idle(&self) -> Option<Box<dyn Connection>> {
        let mut rx = self.returns_rx.lock().ok()?;
        while let Ok(conn) = rx.try_recv() {
            if conn.is_open() {
                return Some(conn);
            }
            tracing::debug!(uri = %self.uri, "discarding idle connection closed by peer");
        }
        None
    }

    fn lease(&self, conn: Box<dyn Connection>) -> ConnectionHandle {
        let returns = self.returns_tx.clone();
        ConnectionHandle::new(conn, move |conn, dispose| {
            if !dispose && conn.is_open() {
                // A full channel cannot happen (unbounded); a closed one
                // means the pool is gone and the connection just drops.
                let _ = returns.send(conn);
            }
        })
    }

    async fn dial(&self) -> Result<Box<dyn Connection>, TransportError> {
        let host = self
            .uri
            .host()
            .ok_or_else(|| TransportError::InvalidTarget(self.uri.to_string()))?;
        let port = self.uri.port_u16().unwrap_or(80);
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: addr.clone(),
                source,
            })?;
        let (sender, connection) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| TransportError::Handshake {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;
        // The driver task owns the socket; it ends when the sender side
        // is dropped or the peer closes.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "connection driver finished with error");
            }
        });
        tracing::debug!(addr = %addr, "opened connection");
        Ok(Box::new(Http1Connection {
            uri: self.uri.clone(),
            sender,
        }))
    }
}

#[async_trait]
impl ConnectionPool for HttpConnectionPool {
    async fn acquire(&self, eager: bool) -> Result<ConnectionHandle, TransportError> {
        if !eager {
            if let Some(conn) = self.take_idle() {
                return Ok(self.lease(conn));
            }
        }
        let conn = self.dial().await?;
        Ok(self.lease(conn))
    }

    fn uri(&self) -> &Uri {
        &self.uri
    }
}

struct Http1Connection {
    uri: Uri,
    sender: http1::SendRequest<RemotingBody>,
}

#[async_trait]
impl Connection for Http1Connection {
    fn uri(&self) -> &Uri {
        &self.uri
    }

    async fn send(
        &mut self,
        request: Request<RemotingBody>,
    ) -> Result<Response<ResponseBody>, TransportError> {
        let response = self
            .sender
            .send_request(request)
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(response.map(|incoming| incoming.map_err(io::Error::other).boxed_unsync()))
    }

    fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}
