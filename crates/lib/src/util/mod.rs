//! Shared utilities.
//!
//! Content hashing and test helpers.

pub mod hash;

#[cfg(test)]
pub mod testutil;
