//! Merge rules applied when layering configuration sources.

pub mod merge_policy;
