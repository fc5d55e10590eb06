//! Page identifiers
//!
//! Storage hands out pages in contiguous runs. A run is addressed by the id of
//! its first page; ids are never reused within a store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the first page of an allocated run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(u64);

impl PageId {
    /// Wrap a raw page number
    pub const fn new(raw: u64) -> Self {
        PageId(raw)
    }

    /// Raw page number
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
