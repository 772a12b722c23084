//! Checkpoint persistence.
//!
//! # Responsibility
//! - Define the stage-keyed checkpoint store contract.
//! - Isolate SQLite details from pipeline orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`Serialization`, `InvalidData`)
//!   in addition to DB transport errors.

pub mod checkpoint_repo;
