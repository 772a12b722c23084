//! Pipeline use cases.
//!
//! # Responsibility
//! - Orchestrate sources, checkpoints and geocoding into a dataset.
//! - Keep the CLI decoupled from storage and provider details.

pub mod dataset_service;
pub mod pipeline_service;
