//! The write path.
//!
//! `Catalog` turns creation requests into records: it assigns ids and
//! timestamps from the injected clock, derives slugs, runs field validators,
//! and only then hands the finished record to the store. A request that
//! fails validation never reaches the store.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{new_v7, Clock, SystemClock};
use crate::config::LabConfig;
use crate::defaults;
use crate::error::{Error, Result};
use crate::models::*;
use crate::slug::{generate_unique_slug, slugify, SlugSource};
use crate::traits::RecordStore;
use crate::validators::{validate_json_dict, ValidatorRegistry};

/// Service owning the invariants of the record store.
pub struct Catalog<S> {
    store: S,
    clock: Arc<dyn Clock>,
    validators: ValidatorRegistry,
    config: LabConfig,
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(Error::validation(format!(
            "{} is {} characters, the limit is {}",
            field, len, max
        )));
    }
    Ok(())
}

fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}

/// Explicit slug if given, otherwise the slugified name.
fn resolve_slug(explicit: Option<&str>, name: &str, max: usize) -> Result<String> {
    let slug = match explicit {
        Some(s) => {
            let normalized = slugify(s);
            if normalized != s {
                return Err(Error::validation(format!(
                    "slug {:?} is not URL-safe (expected {:?})",
                    s, normalized
                )));
            }
            normalized
        }
        None => slugify(name),
    };
    if slug.is_empty() {
        return Err(Error::validation(format!(
            "cannot derive a slug from {:?}",
            name
        )));
    }
    check_len("slug", &slug, max)?;
    Ok(slug)
}

impl<S: RecordStore> Catalog<S> {
    /// A catalog on the system clock with the built-in validators.
    pub fn new(store: S) -> Self {
        Self::with_parts(
            store,
            Arc::new(SystemClock),
            ValidatorRegistry::with_builtins(),
            LabConfig::default(),
        )
    }

    pub fn with_parts(
        store: S,
        clock: Arc<dyn Clock>,
        validators: ValidatorRegistry,
        config: LabConfig,
    ) -> Self {
        Self {
            store,
            clock,
            validators,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    // =========================================================================
    // TERMS
    // =========================================================================

    pub async fn create_term(&self, req: NewTerm) -> Result<Term> {
        required("term name", &req.name)?;
        check_len("term name", &req.name, defaults::TERM_NAME_MAX_LEN)?;
        let slug = resolve_slug(req.slug.as_deref(), &req.name, defaults::SLUG_MAX_LEN)?;
        self.validators.validate_references(Some(&req.validators))?;

        if self.store.term_name_exists(&req.name).await? {
            return Err(Error::Conflict(format!("term name {:?} already exists", req.name)));
        }
        if self.store.term_slug_exists(&slug).await? {
            return Err(Error::Conflict(format!("term slug {:?} already exists", slug)));
        }

        let now = self.clock.now();
        let term = Term {
            id: new_v7(),
            name: req.name,
            slug,
            description: req.description,
            validators: req.validators,
            created_by: req.created_by,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_term(&term).await?;
        info!(
            subsystem = "catalog",
            op = "create_term",
            term_id = %term.id,
            slug = %term.slug,
            "Term created"
        );
        Ok(term)
    }

    pub async fn term(&self, id: Uuid) -> Result<Term> {
        self.store
            .get_term(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("term {}", id)))
    }

    pub async fn delete_term(&self, id: Uuid) -> Result<()> {
        self.store.delete_term(id).await
    }

    // =========================================================================
    // LOCATIONS
    // =========================================================================

    pub async fn create_location(&self, req: NewLocation) -> Result<Location> {
        required("location name", &req.name)?;
        check_len("location name", &req.name, defaults::LOCATION_NAME_MAX_LEN)?;
        let slug = resolve_slug(req.slug.as_deref(), &req.name, defaults::SLUG_FIELD_MAX_LEN)?;

        if let Some(parent) = req.parent_id {
            self.location(parent).await?;
        }
        if self.store.location_name_exists(&req.name).await? {
            return Err(Error::Conflict(format!(
                "location name {:?} already exists",
                req.name
            )));
        }
        if self.store.location_slug_exists(&slug).await? {
            return Err(Error::Conflict(format!(
                "location slug {:?} already exists",
                slug
            )));
        }

        let now = self.clock.now();
        let location = Location {
            id: new_v7(),
            name: req.name,
            slug,
            parent_id: req.parent_id,
            description: req.description,
            geometry: req.geometry,
            created_by: req.created_by,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_location(&location).await?;
        info!(
            subsystem = "catalog",
            op = "create_location",
            location_id = %location.id,
            slug = %location.slug,
            "Location created"
        );
        Ok(location)
    }

    pub async fn location(&self, id: Uuid) -> Result<Location> {
        self.store
            .get_location(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("location {}", id)))
    }

    pub async fn delete_location(&self, id: Uuid) -> Result<()> {
        self.store.delete_location(id).await
    }

    // =========================================================================
    // PARAMETERS
    // =========================================================================

    pub async fn create_parameter(&self, req: NewParameter) -> Result<Parameter> {
        required("parameter name", &req.name)?;
        check_len("parameter name", &req.name, defaults::PARAMETER_NAME_MAX_LEN)?;
        let slug = resolve_slug(req.slug.as_deref(), &req.name, defaults::SLUG_FIELD_MAX_LEN)?;
        self.validators.validate_references(Some(&req.validators))?;

        if let Some(parent) = req.parent_id {
            self.parameter(parent).await?;
        }
        if self.store.parameter_name_exists(&req.name).await? {
            return Err(Error::Conflict(format!(
                "parameter name {:?} already exists",
                req.name
            )));
        }
        if self.store.parameter_slug_exists(&slug).await? {
            return Err(Error::Conflict(format!(
                "parameter slug {:?} already exists",
                slug
            )));
        }

        let now = self.clock.now();
        let parameter = Parameter {
            id: new_v7(),
            name: req.name,
            slug,
            parent_id: req.parent_id,
            description: req.description,
            validators: req.validators,
            created_by: req.created_by,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_parameter(&parameter).await?;
        info!(
            subsystem = "catalog",
            op = "create_parameter",
            parameter_id = %parameter.id,
            slug = %parameter.slug,
            "Parameter created"
        );
        Ok(parameter)
    }

    pub async fn parameter(&self, id: Uuid) -> Result<Parameter> {
        self.store
            .get_parameter(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("parameter {}", id)))
    }

    pub async fn delete_parameter(&self, id: Uuid) -> Result<()> {
        self.store.delete_parameter(id).await
    }

    // =========================================================================
    // SAMPLES
    // =========================================================================

    /// Create a sample, generating its slug.
    ///
    /// If another writer takes the chosen slug between the lookup and the
    /// insert, the slug is regenerated, up to `slug_insert_retries` attempts.
    pub async fn create_sample(&self, req: NewSample) -> Result<Sample> {
        let start = Instant::now();
        let name = req.name.unwrap_or_default();
        check_len("sample name", &name, defaults::SAMPLE_NAME_MAX_LEN)?;

        if let Some(parent) = req.parent_id {
            self.sample(parent).await?;
        }
        let location = match req.location_id {
            Some(id) => Some(self.location(id).await?),
            None => None,
        };

        let now = self.clock.now();
        let mut sample = Sample {
            id: new_v7(),
            name,
            slug: String::new(),
            parent_id: req.parent_id,
            collected_at: req.collected_at,
            location_id: req.location_id,
            created_by: req.created_by,
            created_at: now,
            updated_at: now,
        };

        let attempts = self.config.slug_insert_retries;
        for attempt in 1..=attempts {
            let source = SlugSource {
                id: sample.id,
                user: sample.created_by.as_deref(),
                name: Some(sample.name.as_str()),
                location_slug: location.as_ref().map(|l| l.slug.as_str()),
                collected_at: sample.collected_at,
                created_at: Some(sample.created_at),
            };
            sample.slug = self.unique_slug(&source).await?;

            match self.store.insert_sample(&sample).await {
                Ok(()) => {
                    info!(
                        subsystem = "catalog",
                        op = "create_sample",
                        sample_id = %sample.id,
                        slug = %sample.slug,
                        attempt,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Sample created"
                    );
                    return Ok(sample);
                }
                Err(e) if e.is_slug_conflict() && attempt < attempts => {
                    warn!(
                        subsystem = "catalog",
                        op = "create_sample",
                        sample_id = %sample.id,
                        slug = %sample.slug,
                        attempt,
                        "Slug taken concurrently, regenerating"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::Internal(
            "slug_insert_retries must be at least 1".to_string(),
        ))
    }

    async fn unique_slug(&self, source: &SlugSource<'_>) -> Result<String> {
        let mut probes = source.candidates(self.clock.as_ref(), &self.config.slug);
        probes.push(source.fallback());
        let taken = self.store.existing_sample_slugs(&probes).await?;
        generate_unique_slug(source, self.clock.as_ref(), &self.config.slug, |slug| {
            Ok(taken.contains(slug))
        })
    }

    pub async fn sample(&self, id: Uuid) -> Result<Sample> {
        self.store
            .get_sample(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sample {}", id)))
    }

    pub async fn sample_by_slug(&self, slug: &str) -> Result<Sample> {
        self.store
            .get_sample_by_slug(slug)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sample {:?}", slug)))
    }

    /// Change a sample's display name. The slug stays as generated.
    pub async fn rename_sample(&self, id: Uuid, name: &str) -> Result<Sample> {
        check_len("sample name", name, defaults::SAMPLE_NAME_MAX_LEN)?;
        self.store
            .update_sample_name(id, name, self.clock.now())
            .await?;
        self.sample(id).await
    }

    pub async fn delete_sample(&self, id: Uuid) -> Result<()> {
        self.store.delete_sample(id).await
    }

    // =========================================================================
    // MEASUREMENTS
    // =========================================================================

    /// Record a measurement after checking its value against the
    /// parameter's validators and its tags against the object shape.
    pub async fn record_measurement(&self, req: NewMeasurement) -> Result<Measurement> {
        let tags = validate_json_dict(Some(&req.tags))?;
        let tags = if req.tags.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&tags)?
        };

        self.sample(req.sample_id).await?;
        let parameter = self.parameter(req.parameter_id).await?;
        self.validators.apply(&parameter.validators, &req.value)?;
        debug!(
            subsystem = "catalog",
            op = "record_measurement",
            parameter_id = %parameter.id,
            validators = %parameter.validators,
            "Measurement value passed parameter validators"
        );

        let now = self.clock.now();
        let measurement = Measurement {
            id: new_v7(),
            sample_id: req.sample_id,
            parameter_id: req.parameter_id,
            value: req.value,
            tags,
            created_by: req.created_by,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_measurement(&measurement).await?;
        Ok(measurement)
    }

    pub async fn measurements_for_sample(&self, sample_id: Uuid) -> Result<Vec<Measurement>> {
        self.store.list_measurements_for_sample(sample_id).await
    }

    /// Merge key/values into a measurement's tags blob.
    pub async fn set_measurement_tags<I, K>(&self, id: Uuid, pairs: I) -> Result<Measurement>
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        let mut measurement = self
            .store
            .get_measurement(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("measurement {}", id)))?;
        measurement.set_tags(pairs)?;
        measurement.updated_at = self.clock.now();
        self.store
            .update_measurement_tags(id, &measurement.tags, measurement.updated_at)
            .await?;
        Ok(measurement)
    }

    // =========================================================================
    // TAGS
    // =========================================================================

    /// Attach a tag to a location, sample, or parameter.
    ///
    /// The value must pass the key term's validators. The owner's
    /// `updated_at` moves to the tag's creation time.
    pub async fn add_tag(&self, target: TagTarget, term_id: Uuid, value: &str) -> Result<Tag> {
        let term = self.term(term_id).await?;
        self.validators.apply(&term.validators, value)?;

        let exists = match target.kind {
            TargetKind::Location => self.store.get_location(target.id).await?.is_some(),
            TargetKind::Sample => self.store.get_sample(target.id).await?.is_some(),
            TargetKind::Parameter => self.store.get_parameter(target.id).await?.is_some(),
        };
        if !exists {
            return Err(Error::NotFound(target.to_string()));
        }

        let tag = Tag {
            id: new_v7(),
            term_id: term.id,
            term_slug: term.slug,
            value: value.to_string(),
            target,
            created_at: self.clock.now(),
        };
        self.store.insert_tag(&tag).await?;
        debug!(
            subsystem = "catalog",
            op = "add_tag",
            term_id = %tag.term_id,
            target = %tag.target,
            "Tag added"
        );
        Ok(tag)
    }

    pub async fn tags_for(&self, target: TagTarget) -> Result<Vec<Tag>> {
        self.store.list_tags(target).await
    }

    pub async fn delete_tag(&self, id: Uuid) -> Result<()> {
        self.store.delete_tag(id).await
    }
}
