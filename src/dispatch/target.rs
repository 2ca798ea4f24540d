//! Per-target dispatch context.

use std::sync::{Arc, Weak};

use bytes::Buf;
use http::response::Parts;
use http::{header, HeaderValue, Method, Request, StatusCode, Uri};
use thiserror::Error;

use crate::auth::{self, CredentialProvider};
use crate::codec::{
    decode_exception, Codec, CodecError, DecodedException, MarshallingConfig, ObjectInput,
    ObjectOutput, RemoteException,
};
use crate::config::TargetConfig;
use crate::content::{classify, ContentType};
use crate::pool::{ConnectionHandle, ConnectionPool};
use crate::session::SessionAffinity;
use crate::transport::{
    collect_body, drain_body, spawn_marshaller, BodyWriter, RemotingBody, ResponseBody,
    TransportError,
};

/// Terminal failure of one exchange.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Connect, write or read failure. The connection was disposed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request body writer failed. The connection was disposed.
    #[error("request serialization failed: {0}")]
    Serialize(#[source] std::io::Error),

    /// Error status without exception framing. The connection was
    /// disposed.
    #[error("invalid response code {status}")]
    InvalidResponseCode { status: u16 },

    /// The response content type did not satisfy negotiation. The
    /// connection was disposed.
    #[error("invalid response content type: {content_type:?}")]
    InvalidResponseType { content_type: Option<ContentType> },

    /// The server reported an application-level exception. The connection
    /// was reused unless the payload carried trailing bytes.
    #[error(transparent)]
    Remote(#[from] RemoteException),

    /// The exception payload could not be decoded. The connection was
    /// disposed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Successful outcome of one exchange.
pub struct InvocationResult {
    /// Raw response metadata (status, headers).
    pub parts: Parts,
    /// Live response body stream; `None` for a no-content response. The
    /// caller must read it to the end before the pooled connection can
    /// carry another request.
    pub body: Option<ResponseBody>,
}

impl std::fmt::Debug for InvocationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationResult")
            .field("status", &self.parts.status)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Client-side context for one invocation target: composes the connection
/// pool, the object codec, the credential source and the sticky-session
/// state, and drives each exchange to a terminal outcome.
pub struct TargetContext {
    pool: Arc<dyn ConnectionPool>,
    codec: Arc<dyn Codec>,
    credentials: Arc<dyn CredentialProvider>,
    affinity: SessionAffinity,
    config: TargetConfig,
    /// Back-reference handed to detached probe tasks.
    self_ref: Weak<TargetContext>,
}

impl TargetContext {
    pub fn new(
        pool: Arc<dyn ConnectionPool>,
        codec: Arc<dyn Codec>,
        credentials: Arc<dyn CredentialProvider>,
        config: TargetConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            pool,
            codec,
            credentials,
            affinity: SessionAffinity::new(),
            config,
            self_ref: self_ref.clone(),
        })
    }

    /// Kick off eager affinity acquisition when configured to.
    pub fn init(&self) {
        if self.config.eager_affinity {
            self.acquire_affinity();
        }
    }

    /// The pool this context leases connections from.
    pub fn pool(&self) -> &Arc<dyn ConnectionPool> {
        &self.pool
    }

    /// Open an object reader with the given codec configuration.
    pub fn object_reader<'a>(
        &self,
        config: &MarshallingConfig,
        input: Box<dyn std::io::Read + Send + 'a>,
    ) -> Result<Box<dyn ObjectInput + 'a>, CodecError> {
        self.codec.reader(config, input)
    }

    /// Open an object writer with the given codec configuration.
    pub fn object_writer<'a>(
        &self,
        config: &MarshallingConfig,
        output: Box<dyn std::io::Write + Send + 'a>,
    ) -> Result<Box<dyn ObjectOutput + 'a>, CodecError> {
        self.codec.writer(config, output)
    }

    /// The cached sticky-session identifier, if any.
    pub fn session_id(&self) -> Option<String> {
        self.affinity.session_id()
    }

    /// Drop the cached identifier and allow a fresh acquisition. Waiters
    /// parked on the superseded acquisition are released.
    pub fn clear_session_id(&self) {
        self.affinity.clear();
    }

    /// Wait for the sticky-session identifier, starting an acquisition
    /// first when `required`. Returns `None` when no acquisition ever ran
    /// or the probe failed. No timeout.
    pub async fn await_session_id(&self, required: bool) -> Option<String> {
        if required {
            self.acquire_affinity();
        }
        self.affinity.wait_established().await
    }

    /// Start the affinity probe unless one is already in flight or has
    /// completed. Runs detached; its outcome is only logged, and the
    /// waiter latch fires regardless.
    pub fn acquire_affinity(&self) {
        if !self.affinity.begin_acquire() {
            return;
        }
        let Some(ctx) = self.self_ref.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            ctx.run_affinity_probe().await;
            ctx.affinity.complete();
        });
    }

    async fn run_affinity_probe(&self) {
        let connection = match self.pool.acquire(false).await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!(uri = %self.pool.uri(), error = %e, "failed to acquire session affinity");
                return;
            }
        };
        let base = match connection.uri().path() {
            "/" => "",
            path => path,
        };
        let path = format!("{}{}", base, self.config.affinity_path);
        let request = match Request::builder().method(Method::GET).uri(path).body(()) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "failed to build affinity probe request");
                return;
            }
        };
        // The probe's only purpose is the Set-Cookie scan inside dispatch.
        match self.dispatch(connection, request, None, None).await {
            Ok(result) => {
                if let Some(body) = result.body {
                    let _ = drain_body(body).await;
                }
            }
            Err(e) => {
                tracing::warn!(uri = %self.pool.uri(), error = %e, "failed to acquire session affinity");
            }
        }
    }

    /// Run one exchange to its terminal outcome.
    ///
    /// Decorates `request` with the session cookie, authorization and host
    /// headers, streams the marshalled payload if a `body_writer` is
    /// given, classifies the response against `expected`, and decodes
    /// exception framing. The leased connection is released exactly once
    /// on every path, disposed on anything that may have left it in an
    /// unknown state.
    pub async fn dispatch(
        &self,
        mut connection: ConnectionHandle,
        mut request: Request<()>,
        body_writer: Option<BodyWriter>,
        expected: Option<&ContentType>,
    ) -> Result<InvocationResult, DispatchError> {
        self.decorate(&mut request, connection.uri());

        let (body, marshal_error) = match body_writer {
            Some(writer) => {
                let marshalled = spawn_marshaller(writer);
                (marshalled.body, Some(marshalled.error))
            }
            None => (RemotingBody::Empty, None),
        };
        let request = request.map(|()| body);

        let response = match connection.send(request).await {
            Ok(response) => response,
            Err(e) => {
                connection.release(true);
                // A failed body writer surfaces through the transport;
                // report the root cause instead.
                if let Some(cause) = marshal_error
                    .and_then(|slot| slot.lock().ok().and_then(|mut cause| cause.take()))
                {
                    return Err(DispatchError::Serialize(cause));
                }
                return Err(e.into());
            }
        };

        let (parts, body) = response.into_parts();
        let observed = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(ContentType::parse);
        let classification = classify(observed.as_ref(), expected);

        if !classification.ok {
            connection.release(true);
            return Err(if parts.status.as_u16() >= 400 {
                DispatchError::InvalidResponseCode {
                    status: parts.status.as_u16(),
                }
            } else {
                DispatchError::InvalidResponseType {
                    content_type: observed,
                }
            });
        }

        self.scan_session_cookie(&parts);

        if classification.is_exception {
            return Err(self.handle_exception(connection, body).await);
        }

        if parts.status.as_u16() >= 400 {
            // An error status with an acceptable content type and no
            // exception framing; nothing further can be decoded from it.
            connection.release(true);
            return Err(DispatchError::InvalidResponseCode {
                status: parts.status.as_u16(),
            });
        }

        if parts.status == StatusCode::NO_CONTENT {
            if let Err(e) = drain_body(body).await {
                connection.release(true);
                return Err(e.into());
            }
            connection.release(false);
            Ok(InvocationResult { parts, body: None })
        } else {
            connection.release(false);
            Ok(InvocationResult {
                parts,
                body: Some(body),
            })
        }
    }

    fn decorate(&self, request: &mut Request<()>, uri: &Uri) {
        if let Some(session_id) = self.affinity.session_id() {
            let cookie = format!("{}={}", self.config.session_cookie_name, session_id);
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    request.headers_mut().append(header::COOKIE, value);
                }
                Err(_) => {
                    tracing::debug!("cached session identifier is not a valid header value");
                }
            }
        }
        if let Some(value) = auth::basic_auth_header(self.credentials.as_ref(), uri) {
            request.headers_mut().insert(header::AUTHORIZATION, value);
        }
        if let Some(host) = uri.host() {
            if let Ok(value) = HeaderValue::from_str(host) {
                request.headers_mut().insert(header::HOST, value);
            }
        }
    }

    /// Scan Set-Cookie headers for the session cookie and cache its
    /// value. Runs on every acceptable response, probe or not.
    fn scan_session_cookie(&self, parts: &Parts) {
        for value in parts.headers.get_all(header::SET_COOKIE) {
            if let Ok(raw) = value.to_str() {
                if let Some(session_id) = cookie_value(raw, &self.config.session_cookie_name) {
                    tracing::debug!("caching session affinity identifier");
                    self.affinity.update(session_id);
                }
            }
        }
    }

    async fn handle_exception(
        &self,
        connection: ConnectionHandle,
        body: ResponseBody,
    ) -> DispatchError {
        let bytes = match collect_body(body).await {
            Ok(bytes) => bytes,
            Err(e) => {
                connection.release(true);
                return e.into();
            }
        };
        let decoded = {
            let config = MarshallingConfig::exceptions();
            let reader = self.codec.reader(&config, Box::new(bytes.reader()));
            reader.and_then(|mut reader| decode_exception(reader.as_mut()))
        };
        match decoded {
            Ok(DecodedException {
                exception,
                trailing_data,
            }) => {
                if trailing_data {
                    tracing::debug!("unexpected data after exception payload, disposing connection");
                    connection.release(true);
                } else {
                    connection.release(false);
                }
                DispatchError::Remote(exception)
            }
            Err(e) => {
                connection.release(true);
                e.into()
            }
        }
    }
}

/// Extract the value of `name` from a Set-Cookie header value.
fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    let first_pair = header.split(';').next()?;
    let (key, value) = first_pair.split_once('=')?;
    if key.trim() == name {
        Some(value.trim())
    } else {
        None
    }
}
