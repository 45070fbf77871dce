//! The synthetic event record streamed to consumers.
//!
//! One [`Event`] is produced per tick and serialized to a single line of
//! JSON. The field names and their order are part of the wire contract:
//!
//! ```text
//! {"id":"k3j9x0qa","ts":"2026-10-19T08:15:02.123456Z","value":42.318,"type":"click"}
//! ```
//!
//! Events carry no identity beyond their own fields and are discarded once
//! serialized.

use serde::{Deserialize, Serialize};

/// The interaction an event describes.
///
/// Serialized in lowercase (`"click"`, `"view"`, `"purchase"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A user clicked something.
    Click,
    /// A user viewed something.
    View,
    /// A user bought something.
    Purchase,
}

impl EventKind {
    /// Every kind, in declaration order. Sampling picks uniformly from this.
    pub const ALL: [Self; 3] = [Self::Click, Self::View, Self::Purchase];

    /// The wire name of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::View => "view",
            Self::Purchase => "purchase",
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One synthetic event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Short random identifier (lowercase letters and digits). Not unique.
    pub id: String,
    /// UTC timestamp, `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
    pub ts: String,
    /// Uniform sample in `[0, 100]`, rounded to 3 decimal places.
    pub value: f64,
    /// The interaction kind, serialized under the key `type`.
    #[serde(rename = "type")]
    pub kind: EventKind,
}

impl Event {
    /// Serialize the event as one line of JSON, without the trailing newline.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
