//! Core types and traits for Strata
//!
//! This crate defines the foundational types shared by the storage layer and
//! the vector engine:
//! - PageId: Identifier of a run of contiguous storage pages
//! - Limits: Page size and container packing bounds
//! - Error: Storage-level error type (`StrataError`)
//! - Traits: The transaction seam (`PageRead`, `PageWrite`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod traits;
pub mod types;

pub use error::{StrataError, StrataResult};
pub use limits::{
    pages_for_bytes, slots_per_container, ContainerLayout, MAX_CONTAINER_PAGES, MAX_CONTAINER_SLOTS,
    PAGE_SIZE,
};
pub use traits::{KeyValues, PageRead, PageWrite};
pub use types::PageId;
