//! Repository traits for labtrack records.
//!
//! These traits define the record store the write path talks to. The
//! PostgreSQL implementations live in `labtrack-db`; [`crate::memory`]
//! provides an in-process implementation for tests and embedding.
//!
//! Inserts receive fully built records: ids, slugs, and timestamps are
//! assigned by [`crate::catalog::Catalog`] before a repository sees them.
//! Repositories enforce uniqueness and reference integrity and report
//! violations as [`crate::Error::Conflict`].

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// TERM REPOSITORY
// =============================================================================

/// Repository for vocabulary terms.
#[async_trait]
pub trait TermRepository: Send + Sync {
    /// Insert a term; duplicate name or slug is a conflict.
    async fn insert_term(&self, term: &Term) -> Result<()>;

    /// Fetch a term by id.
    async fn get_term(&self, id: Uuid) -> Result<Option<Term>>;

    /// Fetch a term by slug.
    async fn get_term_by_slug(&self, slug: &str) -> Result<Option<Term>>;

    /// List all terms ordered by name.
    async fn list_terms(&self) -> Result<Vec<Term>>;

    /// Check whether a term name is taken.
    async fn term_name_exists(&self, name: &str) -> Result<bool>;

    /// Check whether a term slug is taken.
    async fn term_slug_exists(&self, slug: &str) -> Result<bool>;

    /// Delete a term; a term used as a tag key is protected.
    async fn delete_term(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// LOCATION REPOSITORY
// =============================================================================

/// Repository for the location tree.
#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// Insert a location; duplicate name or slug is a conflict.
    async fn insert_location(&self, location: &Location) -> Result<()>;

    /// Fetch a location by id.
    async fn get_location(&self, id: Uuid) -> Result<Option<Location>>;

    /// Fetch a location by slug.
    async fn get_location_by_slug(&self, slug: &str) -> Result<Option<Location>>;

    /// List children of a location, or roots when `parent_id` is `None`.
    async fn list_locations(&self, parent_id: Option<Uuid>) -> Result<Vec<Location>>;

    /// Check whether a location name is taken.
    async fn location_name_exists(&self, name: &str) -> Result<bool>;

    /// Check whether a location slug is taken.
    async fn location_slug_exists(&self, slug: &str) -> Result<bool>;

    /// Delete a location and its tags. Child locations and samples at the
    /// location protect it.
    async fn delete_location(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// SAMPLE REPOSITORY
// =============================================================================

/// Repository for samples.
#[async_trait]
pub trait SampleRepository: Send + Sync {
    /// Insert a sample. A taken slug is a conflict naming `sample_slug_key`.
    async fn insert_sample(&self, sample: &Sample) -> Result<()>;

    /// Fetch a sample by id.
    async fn get_sample(&self, id: Uuid) -> Result<Option<Sample>>;

    /// Fetch a sample by slug.
    async fn get_sample_by_slug(&self, slug: &str) -> Result<Option<Sample>>;

    /// List children of a sample, or roots when `parent_id` is `None`.
    async fn list_samples(&self, parent_id: Option<Uuid>) -> Result<Vec<Sample>>;

    /// Which of `slugs` already belong to a sample.
    async fn existing_sample_slugs(&self, slugs: &[String]) -> Result<HashSet<String>>;

    /// Number of samples with exactly this slug (0 or 1 given the unique index).
    async fn count_samples_with_slug(&self, slug: &str) -> Result<i64>;

    /// Update the display name. The slug is never touched.
    async fn update_sample_name(&self, id: Uuid, name: &str, at: DateTime<Utc>) -> Result<()>;

    /// Delete a sample with its measurements and tags. Child samples
    /// protect it.
    async fn delete_sample(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// PARAMETER REPOSITORY
// =============================================================================

/// Repository for the parameter tree.
#[async_trait]
pub trait ParameterRepository: Send + Sync {
    /// Insert a parameter; duplicate name or slug is a conflict.
    async fn insert_parameter(&self, parameter: &Parameter) -> Result<()>;

    /// Fetch a parameter by id.
    async fn get_parameter(&self, id: Uuid) -> Result<Option<Parameter>>;

    /// Fetch a parameter by slug.
    async fn get_parameter_by_slug(&self, slug: &str) -> Result<Option<Parameter>>;

    /// List children of a parameter, or roots when `parent_id` is `None`.
    async fn list_parameters(&self, parent_id: Option<Uuid>) -> Result<Vec<Parameter>>;

    /// Check whether a parameter name is taken.
    async fn parameter_name_exists(&self, name: &str) -> Result<bool>;

    /// Check whether a parameter slug is taken.
    async fn parameter_slug_exists(&self, slug: &str) -> Result<bool>;

    /// Delete a parameter and its tags. Child parameters and measurements
    /// protect it.
    async fn delete_parameter(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// MEASUREMENT REPOSITORY
// =============================================================================

/// Repository for measurements.
#[async_trait]
pub trait MeasurementRepository: Send + Sync {
    /// Insert a measurement; sample and parameter must exist.
    async fn insert_measurement(&self, measurement: &Measurement) -> Result<()>;

    /// Fetch a measurement by id.
    async fn get_measurement(&self, id: Uuid) -> Result<Option<Measurement>>;

    /// All measurements of a sample, oldest first.
    async fn list_measurements_for_sample(&self, sample_id: Uuid) -> Result<Vec<Measurement>>;

    /// Replace the tags blob.
    async fn update_measurement_tags(&self, id: Uuid, tags: &str, at: DateTime<Utc>)
        -> Result<()>;

    /// Delete a measurement.
    async fn delete_measurement(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// TAG REPOSITORY
// =============================================================================

/// Repository for tags on locations, samples, and parameters.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Insert a tag and set the owner's `updated_at` to `tag.created_at`,
    /// atomically.
    async fn insert_tag(&self, tag: &Tag) -> Result<()>;

    /// Tags of one record, oldest first.
    async fn list_tags(&self, target: TagTarget) -> Result<Vec<Tag>>;

    /// Delete a tag.
    async fn delete_tag(&self, id: Uuid) -> Result<()>;
}

/// The full record store used by the write path.
pub trait RecordStore:
    TermRepository
    + LocationRepository
    + SampleRepository
    + ParameterRepository
    + MeasurementRepository
    + TagRepository
{
}

impl<T> RecordStore for T where
    T: TermRepository
        + LocationRepository
        + SampleRepository
        + ParameterRepository
        + MeasurementRepository
        + TagRepository
{
}
