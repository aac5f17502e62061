//! # labtrack-core
//!
//! Core types and write-path logic for labtrack, a laboratory sample and
//! measurement tracker.
//!
//! This crate provides:
//! - Domain models for terms, tags, locations, samples, parameters, and
//!   measurements
//! - Unique sample slug generation ([`slug`])
//! - JSON and numeric field validators with a name registry ([`validators`])
//! - Repository traits and an in-memory store
//! - [`Catalog`], the service that assigns ids, timestamps, and slugs and
//!   validates records before they are stored
//!
//! ## Logging
//!
//! Events are emitted with `tracing` and carry `subsystem`, `op`, and the
//! affected ids as structured fields. WARN marks an automatic fallback (slug
//! fell back to the sample id, slug regenerated after a concurrent insert);
//! DEBUG marks decision points such as each slug candidate probed.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod defaults;
pub mod error;
pub mod memory;
pub mod models;
pub mod slug;
pub mod traits;
pub mod validators;

// Re-export commonly used types at crate root
pub use catalog::Catalog;
pub use clock::{is_v7, new_v7, Clock, FixedClock, SystemClock};
pub use config::{LabConfig, SlugConfig};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use models::*;
pub use slug::{generate_unique_slug, slugify, DateFormat, SlugSource};
pub use traits::*;
pub use validators::{
    numeric_range_validator, validate_json, validate_json_dict, validate_json_list,
    validate_numeric_range, validate_validator_list, JsonKind, ResolvedValidator, ValidatorFn,
    ValidatorRegistry,
};
