//! Settlement domain model.
//!
//! # Responsibility
//! - Define the settlement record carried through every pipeline stage.
//! - Define the persisted dataset envelope and its metadata.
//!
//! # Invariants
//! - Population is an exact integer; no stage may silently drop people.
//! - `constituent_settlements` across a dataset partitions the input names.

pub mod dataset;
pub mod settlement;
