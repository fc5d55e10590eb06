//! Query operators for Strata
//!
//! This crate provides:
//! - QueryMatch trait for operators of the boolean query evaluator
//! - SortedIdMatch, AndMatch and BoostMatch
//! - VectorQueryMatch, the nearest-neighbor clause, in standalone or composed mode
//! - remove_duplicates, the min-distance fold over id-sorted results
//!
//! # Usage
//!
//! ```ignore
//! use strata_search::{AndMatch, QueryMatch, SortedIdMatch, VectorQueryMatch};
//!
//! let search = index.approximate_nearest(&txn, "embedding", 64, &query, 0.5)?;
//! let vector = VectorQueryMatch::composed(search, index.config().buffer_growth());
//! let mut both = AndMatch::new(vec![Box::new(vector), Box::new(SortedIdMatch::new(postings))]);
//! let n = both.fill(&mut ids);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod matcher;
pub mod vector;

pub use matcher::{AndMatch, BoostMatch, QueryMatch, SortedIdMatch};
pub use vector::{remove_duplicates, VectorQueryMatch};
