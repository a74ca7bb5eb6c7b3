//! Filesystem utilities for tac1100.
//!
//! Lock records must appear in one step: a reader either sees no record or a
//! complete one. This module provides the primitives for that.

pub mod publish;

pub use publish::{LinkOutcome, link_exclusive, remove_if_exists, same_file, write_new_file};
