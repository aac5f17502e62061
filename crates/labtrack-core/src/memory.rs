//! In-process record store.
//!
//! `MemoryStore` implements every repository trait over hash maps behind a
//! single `tokio::sync::RwLock`, with the same uniqueness, protection, and
//! cascade rules as the PostgreSQL schema. Conflict messages name the same
//! constraints the database would.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::traits::*;

#[derive(Debug, Default)]
struct State {
    terms: HashMap<Uuid, Term>,
    locations: HashMap<Uuid, Location>,
    samples: HashMap<Uuid, Sample>,
    parameters: HashMap<Uuid, Parameter>,
    measurements: HashMap<Uuid, Measurement>,
    tags: HashMap<Uuid, Tag>,
    /// Slugs taken by writers outside this store.
    claimed_slugs: HashSet<String>,
    /// Slugs to claim right after the next slug lookup.
    pending_claims: Vec<String>,
}

impl State {
    fn sample_slug_taken(&self, slug: &str) -> bool {
        self.claimed_slugs.contains(slug) || self.samples.values().any(|s| s.slug == slug)
    }

    fn target_exists(&self, target: TagTarget) -> bool {
        match target.kind {
            TargetKind::Location => self.locations.contains_key(&target.id),
            TargetKind::Sample => self.samples.contains_key(&target.id),
            TargetKind::Parameter => self.parameters.contains_key(&target.id),
        }
    }

    fn touch_target(&mut self, target: TagTarget, at: DateTime<Utc>) {
        match target.kind {
            TargetKind::Location => {
                if let Some(l) = self.locations.get_mut(&target.id) {
                    l.updated_at = at;
                }
            }
            TargetKind::Sample => {
                if let Some(s) = self.samples.get_mut(&target.id) {
                    s.updated_at = at;
                }
            }
            TargetKind::Parameter => {
                if let Some(p) = self.parameters.get_mut(&target.id) {
                    p.updated_at = at;
                }
            }
        }
    }

    fn drop_tags_of(&mut self, target: TagTarget) {
        self.tags.retain(|_, tag| tag.target != target);
    }
}

fn duplicate(constraint: &str) -> Error {
    Error::Conflict(format!(
        "duplicate key value violates unique constraint \"{}\"",
        constraint
    ))
}

fn protected(table: &str, constraint: &str) -> Error {
    Error::Conflict(format!(
        "delete on table \"{}\" violates foreign key constraint \"{}\"",
        table, constraint
    ))
}

fn missing_reference(constraint: &str) -> Error {
    Error::Conflict(format!(
        "insert violates foreign key constraint \"{}\"",
        constraint
    ))
}

/// In-memory implementation of [`RecordStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `slug` as taken by another writer as soon as the next slug lookup
    /// has returned, reproducing a race between lookup and insert.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn claim_slug_after_next_lookup(&self, slug: impl Into<String>) {
        self.state.write().await.pending_claims.push(slug.into());
    }
}

#[async_trait]
impl TermRepository for MemoryStore {
    async fn insert_term(&self, term: &Term) -> Result<()> {
        let mut state = self.state.write().await;
        if state.terms.values().any(|t| t.name == term.name) {
            return Err(duplicate("term_name_key"));
        }
        if state.terms.values().any(|t| t.slug == term.slug) {
            return Err(duplicate("term_slug_key"));
        }
        state.terms.insert(term.id, term.clone());
        Ok(())
    }

    async fn get_term(&self, id: Uuid) -> Result<Option<Term>> {
        Ok(self.state.read().await.terms.get(&id).cloned())
    }

    async fn get_term_by_slug(&self, slug: &str) -> Result<Option<Term>> {
        let state = self.state.read().await;
        Ok(state.terms.values().find(|t| t.slug == slug).cloned())
    }

    async fn list_terms(&self) -> Result<Vec<Term>> {
        let state = self.state.read().await;
        let mut terms: Vec<Term> = state.terms.values().cloned().collect();
        terms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(terms)
    }

    async fn term_name_exists(&self, name: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.terms.values().any(|t| t.name == name))
    }

    async fn term_slug_exists(&self, slug: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.terms.values().any(|t| t.slug == slug))
    }

    async fn delete_term(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.terms.contains_key(&id) {
            return Err(Error::NotFound(format!("term {}", id)));
        }
        if state.tags.values().any(|t| t.term_id == id) {
            return Err(protected("term", "tag_term_id_fkey"));
        }
        state.terms.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl LocationRepository for MemoryStore {
    async fn insert_location(&self, location: &Location) -> Result<()> {
        let mut state = self.state.write().await;
        if state.locations.values().any(|l| l.name == location.name) {
            return Err(duplicate("location_name_key"));
        }
        if state.locations.values().any(|l| l.slug == location.slug) {
            return Err(duplicate("location_slug_key"));
        }
        if let Some(parent) = location.parent_id {
            if !state.locations.contains_key(&parent) {
                return Err(missing_reference("location_parent_id_fkey"));
            }
        }
        state.locations.insert(location.id, location.clone());
        Ok(())
    }

    async fn get_location(&self, id: Uuid) -> Result<Option<Location>> {
        Ok(self.state.read().await.locations.get(&id).cloned())
    }

    async fn get_location_by_slug(&self, slug: &str) -> Result<Option<Location>> {
        let state = self.state.read().await;
        Ok(state.locations.values().find(|l| l.slug == slug).cloned())
    }

    async fn list_locations(&self, parent_id: Option<Uuid>) -> Result<Vec<Location>> {
        let state = self.state.read().await;
        let mut out: Vec<Location> = state
            .locations
            .values()
            .filter(|l| l.parent_id == parent_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn location_name_exists(&self, name: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.locations.values().any(|l| l.name == name))
    }

    async fn location_slug_exists(&self, slug: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.locations.values().any(|l| l.slug == slug))
    }

    async fn delete_location(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.locations.contains_key(&id) {
            return Err(Error::NotFound(format!("location {}", id)));
        }
        if state.locations.values().any(|l| l.parent_id == Some(id)) {
            return Err(protected("location", "location_parent_id_fkey"));
        }
        if state.samples.values().any(|s| s.location_id == Some(id)) {
            return Err(protected("location", "sample_location_id_fkey"));
        }
        state.locations.remove(&id);
        state.drop_tags_of(TagTarget::location(id));
        Ok(())
    }
}

#[async_trait]
impl SampleRepository for MemoryStore {
    async fn insert_sample(&self, sample: &Sample) -> Result<()> {
        let mut state = self.state.write().await;
        if state.sample_slug_taken(&sample.slug) {
            return Err(duplicate("sample_slug_key"));
        }
        if let Some(parent) = sample.parent_id {
            if !state.samples.contains_key(&parent) {
                return Err(missing_reference("sample_parent_id_fkey"));
            }
        }
        if let Some(location) = sample.location_id {
            if !state.locations.contains_key(&location) {
                return Err(missing_reference("sample_location_id_fkey"));
            }
        }
        state.samples.insert(sample.id, sample.clone());
        Ok(())
    }

    async fn get_sample(&self, id: Uuid) -> Result<Option<Sample>> {
        Ok(self.state.read().await.samples.get(&id).cloned())
    }

    async fn get_sample_by_slug(&self, slug: &str) -> Result<Option<Sample>> {
        let state = self.state.read().await;
        Ok(state.samples.values().find(|s| s.slug == slug).cloned())
    }

    async fn list_samples(&self, parent_id: Option<Uuid>) -> Result<Vec<Sample>> {
        let state = self.state.read().await;
        let mut out: Vec<Sample> = state
            .samples
            .values()
            .filter(|s| s.parent_id == parent_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.slug.cmp(&b.slug)));
        Ok(out)
    }

    async fn existing_sample_slugs(&self, slugs: &[String]) -> Result<HashSet<String>> {
        let mut state = self.state.write().await;
        let found = slugs
            .iter()
            .filter(|slug| state.sample_slug_taken(slug))
            .cloned()
            .collect();
        let claims = std::mem::take(&mut state.pending_claims);
        state.claimed_slugs.extend(claims);
        Ok(found)
    }

    async fn count_samples_with_slug(&self, slug: &str) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.samples.values().filter(|s| s.slug == slug).count() as i64)
    }

    async fn update_sample_name(&self, id: Uuid, name: &str, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        let sample = state
            .samples
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("sample {}", id)))?;
        sample.name = name.to_string();
        sample.updated_at = at;
        Ok(())
    }

    async fn delete_sample(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.samples.contains_key(&id) {
            return Err(Error::NotFound(format!("sample {}", id)));
        }
        if state.samples.values().any(|s| s.parent_id == Some(id)) {
            return Err(protected("sample", "sample_parent_id_fkey"));
        }
        state.samples.remove(&id);
        state.measurements.retain(|_, m| m.sample_id != id);
        state.drop_tags_of(TagTarget::sample(id));
        Ok(())
    }
}

#[async_trait]
impl ParameterRepository for MemoryStore {
    async fn insert_parameter(&self, parameter: &Parameter) -> Result<()> {
        let mut state = self.state.write().await;
        if state.parameters.values().any(|p| p.name == parameter.name) {
            return Err(duplicate("parameter_name_key"));
        }
        if state.parameters.values().any(|p| p.slug == parameter.slug) {
            return Err(duplicate("parameter_slug_key"));
        }
        if let Some(parent) = parameter.parent_id {
            if !state.parameters.contains_key(&parent) {
                return Err(missing_reference("parameter_parent_id_fkey"));
            }
        }
        state.parameters.insert(parameter.id, parameter.clone());
        Ok(())
    }

    async fn get_parameter(&self, id: Uuid) -> Result<Option<Parameter>> {
        Ok(self.state.read().await.parameters.get(&id).cloned())
    }

    async fn get_parameter_by_slug(&self, slug: &str) -> Result<Option<Parameter>> {
        let state = self.state.read().await;
        Ok(state.parameters.values().find(|p| p.slug == slug).cloned())
    }

    async fn list_parameters(&self, parent_id: Option<Uuid>) -> Result<Vec<Parameter>> {
        let state = self.state.read().await;
        let mut out: Vec<Parameter> = state
            .parameters
            .values()
            .filter(|p| p.parent_id == parent_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn parameter_name_exists(&self, name: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.parameters.values().any(|p| p.name == name))
    }

    async fn parameter_slug_exists(&self, slug: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.parameters.values().any(|p| p.slug == slug))
    }

    async fn delete_parameter(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.parameters.contains_key(&id) {
            return Err(Error::NotFound(format!("parameter {}", id)));
        }
        if state.parameters.values().any(|p| p.parent_id == Some(id)) {
            return Err(protected("parameter", "parameter_parent_id_fkey"));
        }
        if state.measurements.values().any(|m| m.parameter_id == id) {
            return Err(protected("parameter", "measurement_parameter_id_fkey"));
        }
        state.parameters.remove(&id);
        state.drop_tags_of(TagTarget::parameter(id));
        Ok(())
    }
}

#[async_trait]
impl MeasurementRepository for MemoryStore {
    async fn insert_measurement(&self, measurement: &Measurement) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.samples.contains_key(&measurement.sample_id) {
            return Err(missing_reference("measurement_sample_id_fkey"));
        }
        if !state.parameters.contains_key(&measurement.parameter_id) {
            return Err(missing_reference("measurement_parameter_id_fkey"));
        }
        state.measurements.insert(measurement.id, measurement.clone());
        Ok(())
    }

    async fn get_measurement(&self, id: Uuid) -> Result<Option<Measurement>> {
        Ok(self.state.read().await.measurements.get(&id).cloned())
    }

    async fn list_measurements_for_sample(&self, sample_id: Uuid) -> Result<Vec<Measurement>> {
        let state = self.state.read().await;
        let mut out: Vec<Measurement> = state
            .measurements
            .values()
            .filter(|m| m.sample_id == sample_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn update_measurement_tags(
        &self,
        id: Uuid,
        tags: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let measurement = state
            .measurements
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("measurement {}", id)))?;
        measurement.tags = tags.to_string();
        measurement.updated_at = at;
        Ok(())
    }

    async fn delete_measurement(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .measurements
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("measurement {}", id)))
    }
}

#[async_trait]
impl TagRepository for MemoryStore {
    async fn insert_tag(&self, tag: &Tag) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.terms.contains_key(&tag.term_id) {
            return Err(missing_reference("tag_term_id_fkey"));
        }
        if !state.target_exists(tag.target) {
            return Err(missing_reference(&format!("tag_{}_id_fkey", tag.target.kind)));
        }
        state.touch_target(tag.target, tag.created_at);
        state.tags.insert(tag.id, tag.clone());
        Ok(())
    }

    async fn list_tags(&self, target: TagTarget) -> Result<Vec<Tag>> {
        let state = self.state.read().await;
        let mut out: Vec<Tag> = state
            .tags
            .values()
            .filter(|t| t.target == target)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn delete_tag(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .tags
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("tag {}", id)))
    }
}
