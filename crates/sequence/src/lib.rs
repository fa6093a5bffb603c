//! Ordered task-sequence model and merging for Coalesce
//!
//! This crate provides:
//! - The element model: named steps and completion callbacks
//! - Compatible-order merging of partially overlapping sequences
//! - Ordering-conflict detection between incompatible sequences

pub mod element;
pub mod merge;

pub use element::{Callback, Element, Step};
pub use merge::{merge, MergeError};
