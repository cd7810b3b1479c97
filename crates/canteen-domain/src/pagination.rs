//! Offset pagination shared by list endpoints.

use serde::{Deserialize, Serialize};

/// Pagination parameters for history and ledger listings.
///
/// - `limit`: 1..=100, default 100
/// - `offset`: ≥ 0, default 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    100
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl Page {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// Clamp `limit` to the valid range 1..=100.
    ///
    /// Call after deserializing from query params to enforce bounds.
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.clamp(1, 100),
            offset: self.offset,
        }
    }
}
