//! Versioned content type parsing.

use std::fmt;

/// A content type token plus a non-negative protocol version, carried in a
/// single header value of the form `type;version=n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// The type token, e.g. `application/x-wf-ejb-response`.
    pub name: String,
    /// Protocol version; 0 when the header carries no version parameter.
    pub version: u32,
}

impl ContentType {
    /// Create a content type with an explicit version.
    pub fn new(name: &str, version: u32) -> Self {
        Self {
            name: name.to_string(),
            version,
        }
    }

    /// Parse a header value. Returns `None` for an empty type token or a
    /// malformed version parameter; a missing version parameter parses
    /// as version 0.
    pub fn parse(value: &str) -> Option<ContentType> {
        let mut parts = value.split(';');
        let name = parts.next()?.trim();
        if name.is_empty() {
            return None;
        }
        let mut version = 0;
        for part in parts {
            if let Some((key, val)) = part.split_once('=') {
                if key.trim() == "version" {
                    version = val.trim().parse().ok()?;
                }
            }
        }
        Some(ContentType {
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};version={}", self.name, self.version)
    }
}
