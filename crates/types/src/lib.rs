//! Lattice Types
//!
//! Core data structures for the Lattice streaming indicator engine.
//! This crate provides the quote bar type and the series traits that
//! every cacheable stream record implements.

#![deny(clippy::all)]

pub mod quote;
pub mod series;

// Re-export main types for convenience
pub use quote::Quote;
pub use series::{QuoteSeries, Reusable, Series, TIMESTAMP_MIN};
