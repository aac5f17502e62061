//! `RecordStore` for [`Database`]: each trait forwards to the matching
//! repository field.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use labtrack_core::{
    Location, LocationRepository, Measurement, MeasurementRepository, Parameter,
    ParameterRepository, Result, Sample, SampleRepository, Tag, TagRepository, TagTarget, Term,
    TermRepository,
};

use crate::Database;

#[async_trait]
impl TermRepository for Database {
    async fn insert_term(&self, term: &Term) -> Result<()> {
        self.terms.insert_term(term).await
    }

    async fn get_term(&self, id: Uuid) -> Result<Option<Term>> {
        self.terms.get_term(id).await
    }

    async fn get_term_by_slug(&self, slug: &str) -> Result<Option<Term>> {
        self.terms.get_term_by_slug(slug).await
    }

    async fn list_terms(&self) -> Result<Vec<Term>> {
        self.terms.list_terms().await
    }

    async fn term_name_exists(&self, name: &str) -> Result<bool> {
        self.terms.term_name_exists(name).await
    }

    async fn term_slug_exists(&self, slug: &str) -> Result<bool> {
        self.terms.term_slug_exists(slug).await
    }

    async fn delete_term(&self, id: Uuid) -> Result<()> {
        self.terms.delete_term(id).await
    }
}

#[async_trait]
impl LocationRepository for Database {
    async fn insert_location(&self, location: &Location) -> Result<()> {
        self.locations.insert_location(location).await
    }

    async fn get_location(&self, id: Uuid) -> Result<Option<Location>> {
        self.locations.get_location(id).await
    }

    async fn get_location_by_slug(&self, slug: &str) -> Result<Option<Location>> {
        self.locations.get_location_by_slug(slug).await
    }

    async fn list_locations(&self, parent_id: Option<Uuid>) -> Result<Vec<Location>> {
        self.locations.list_locations(parent_id).await
    }

    async fn location_name_exists(&self, name: &str) -> Result<bool> {
        self.locations.location_name_exists(name).await
    }

    async fn location_slug_exists(&self, slug: &str) -> Result<bool> {
        self.locations.location_slug_exists(slug).await
    }

    async fn delete_location(&self, id: Uuid) -> Result<()> {
        self.locations.delete_location(id).await
    }
}

#[async_trait]
impl SampleRepository for Database {
    async fn insert_sample(&self, sample: &Sample) -> Result<()> {
        self.samples.insert_sample(sample).await
    }

    async fn get_sample(&self, id: Uuid) -> Result<Option<Sample>> {
        self.samples.get_sample(id).await
    }

    async fn get_sample_by_slug(&self, slug: &str) -> Result<Option<Sample>> {
        self.samples.get_sample_by_slug(slug).await
    }

    async fn list_samples(&self, parent_id: Option<Uuid>) -> Result<Vec<Sample>> {
        self.samples.list_samples(parent_id).await
    }

    async fn existing_sample_slugs(&self, slugs: &[String]) -> Result<HashSet<String>> {
        self.samples.existing_sample_slugs(slugs).await
    }

    async fn count_samples_with_slug(&self, slug: &str) -> Result<i64> {
        self.samples.count_samples_with_slug(slug).await
    }

    async fn update_sample_name(&self, id: Uuid, name: &str, at: DateTime<Utc>) -> Result<()> {
        self.samples.update_sample_name(id, name, at).await
    }

    async fn delete_sample(&self, id: Uuid) -> Result<()> {
        self.samples.delete_sample(id).await
    }
}

#[async_trait]
impl ParameterRepository for Database {
    async fn insert_parameter(&self, parameter: &Parameter) -> Result<()> {
        self.parameters.insert_parameter(parameter).await
    }

    async fn get_parameter(&self, id: Uuid) -> Result<Option<Parameter>> {
        self.parameters.get_parameter(id).await
    }

    async fn get_parameter_by_slug(&self, slug: &str) -> Result<Option<Parameter>> {
        self.parameters.get_parameter_by_slug(slug).await
    }

    async fn list_parameters(&self, parent_id: Option<Uuid>) -> Result<Vec<Parameter>> {
        self.parameters.list_parameters(parent_id).await
    }

    async fn parameter_name_exists(&self, name: &str) -> Result<bool> {
        self.parameters.parameter_name_exists(name).await
    }

    async fn parameter_slug_exists(&self, slug: &str) -> Result<bool> {
        self.parameters.parameter_slug_exists(slug).await
    }

    async fn delete_parameter(&self, id: Uuid) -> Result<()> {
        self.parameters.delete_parameter(id).await
    }
}

#[async_trait]
impl MeasurementRepository for Database {
    async fn insert_measurement(&self, measurement: &Measurement) -> Result<()> {
        self.measurements.insert_measurement(measurement).await
    }

    async fn get_measurement(&self, id: Uuid) -> Result<Option<Measurement>> {
        self.measurements.get_measurement(id).await
    }

    async fn list_measurements_for_sample(&self, sample_id: Uuid) -> Result<Vec<Measurement>> {
        self.measurements.list_measurements_for_sample(sample_id).await
    }

    async fn update_measurement_tags(
        &self,
        id: Uuid,
        tags: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.measurements.update_measurement_tags(id, tags, at).await
    }

    async fn delete_measurement(&self, id: Uuid) -> Result<()> {
        self.measurements.delete_measurement(id).await
    }
}

#[async_trait]
impl TagRepository for Database {
    async fn insert_tag(&self, tag: &Tag) -> Result<()> {
        self.tags.insert_tag(tag).await
    }

    async fn list_tags(&self, target: TagTarget) -> Result<Vec<Tag>> {
        self.tags.list_tags(target).await
    }

    async fn delete_tag(&self, id: Uuid) -> Result<()> {
        self.tags.delete_tag(id).await
    }
}
