//! Target configuration.
//!
//! All types derive Serde traits so a target can be described in a config
//! file by an embedding application; defaults match the wire contract the
//! server side expects.

use serde::{Deserialize, Serialize};

/// Configuration for one invocation target.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Issue the session-affinity probe at startup instead of on first use.
    pub eager_affinity: bool,

    /// Cookie carrying the sticky-session identifier.
    pub session_cookie_name: String,

    /// Well-known path of the affinity probe, relative to the target's
    /// base path.
    pub affinity_path: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            eager_affinity: false,
            session_cookie_name: "JSESSIONID".to_string(),
            affinity_path: "/common/v1/affinity".to_string(),
        }
    }
}
