//! Request authentication.
//!
//! # Responsibilities
//! - Resolve credentials for a target through the ambient provider seam
//! - Format the basic-auth Authorization header value
//!
//! # Design Decisions
//! - Resolution failure never fails the exchange: the request is sent
//!   unauthenticated and the failure is logged at debug level

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use http::{HeaderValue, Uri};
use thiserror::Error;

/// Errors from the credential provider. Always absorbed by this module.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The provider does not support password-style credentials for this
    /// target.
    #[error("credential callback unsupported")]
    Unsupported,

    /// Credential lookup failed.
    #[error("credential lookup failed: {0}")]
    Lookup(String),
}

/// A password-style credential.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub principal: String,
    pub secret: String,
}

/// Ambient source of credentials, keyed by target URI.
pub trait CredentialProvider: Send + Sync {
    /// Resolve credentials for `target`. `Ok(None)` means no credentials
    /// are configured for this target.
    fn credentials(&self, target: &Uri) -> Result<Option<Credentials>, CredentialError>;
}

/// Provider with no credentials for any target.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn credentials(&self, _target: &Uri) -> Result<Option<Credentials>, CredentialError> {
        Ok(None)
    }
}

/// Provider returning one fixed credential for every target.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl StaticCredentials {
    pub fn new(principal: &str, secret: &str) -> Self {
        Self(Credentials {
            principal: principal.to_string(),
            secret: secret.to_string(),
        })
    }
}

impl CredentialProvider for StaticCredentials {
    fn credentials(&self, _target: &Uri) -> Result<Option<Credentials>, CredentialError> {
        Ok(Some(self.0.clone()))
    }
}

/// Resolve credentials for `target` and format a basic-auth header value,
/// `basic <base64(principal:secret)>`. Returns `None` when no credentials
/// are available or resolution fails; the exchange proceeds
/// unauthenticated either way.
pub fn basic_auth_header(provider: &dyn CredentialProvider, target: &Uri) -> Option<HeaderValue> {
    let credentials = match provider.credentials(target) {
        Ok(Some(credentials)) => credentials,
        Ok(None) => return None,
        Err(e) => {
            tracing::debug!(uri = %target, error = %e, "credential resolution failed, proceeding unauthenticated");
            return None;
        }
    };
    let challenge = format!("{}:{}", credentials.principal, credentials.secret);
    let value = format!("basic {}", BASE64.encode(challenge.as_bytes()));
    HeaderValue::from_str(&value).ok()
}
