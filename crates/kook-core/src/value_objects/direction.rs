//! Paging direction for message history queries

use serde::{Deserialize, Serialize};

/// Direction relative to an anchor message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Strictly earlier than the anchor, nearest first
    Before,
    /// Strictly later than the anchor, nearest first
    After,
    /// Both sides of the anchor, including the anchor itself
    Around,
}
