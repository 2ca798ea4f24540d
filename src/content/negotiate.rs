//! Response classification.

use crate::content::ContentType;

/// Content type marking a response body as a serialized remote exception.
/// Exceptions share one marker type across all protocols layered on this
/// transport.
pub const EXCEPTION_CONTENT_TYPE: &str = "application/x-wf-jbmar-exception";

/// Verdict of content negotiation for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// The response shape is acceptable to this client.
    pub ok: bool,
    /// The body is an exception payload rather than a result.
    pub is_exception: bool,
}

/// Classify an observed response content type against the type the caller
/// declared it expects.
///
/// Rules, in order:
/// - no observed type: ok iff no type was expected
/// - the exception marker type is always ok, regardless of expectations
/// - an unexpected body (observed present, nothing expected) is not ok
/// - otherwise the type tokens must match and the expected version must be
///   at least the observed one (a client declaring version V accepts any
///   server response at version <= V)
pub fn classify(observed: Option<&ContentType>, expected: Option<&ContentType>) -> Classification {
    match observed {
        None => Classification {
            ok: expected.is_none(),
            is_exception: false,
        },
        Some(observed) if observed.name == EXCEPTION_CONTENT_TYPE => Classification {
            ok: true,
            is_exception: true,
        },
        Some(observed) => {
            let ok = match expected {
                None => false,
                Some(expected) => {
                    expected.name == observed.name && expected.version >= observed.version
                }
            };
            Classification {
                ok,
                is_exception: false,
            }
        }
    }
}
