//! Domain models for labtrack.
//!
//! Locations, samples, and parameters each form their own tree through
//! `parent_id`. Measurements join a sample to a parameter. Tags annotate a
//! location, sample, or parameter with a vocabulary [`Term`] as key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::defaults::MEASUREMENT_DISPLAY_LEN;
use crate::error::Result;
use crate::validators::validate_json_dict;

// =============================================================================
// TERMS
// =============================================================================

/// A controlled-vocabulary entry used as the key of a [`Tag`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Term {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    /// JSON list of validator references applied to tag values.
    #[serde(default)]
    pub validators: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Request to create a term.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NewTerm {
    pub name: String,
    /// Derived from `name` when absent.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub validators: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

// =============================================================================
// TAGS
// =============================================================================

/// Kind of record a tag is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Location,
    Sample,
    Parameter,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Location => write!(f, "location"),
            Self::Sample => write!(f, "sample"),
            Self::Parameter => write!(f, "parameter"),
        }
    }
}

impl std::str::FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "location" => Ok(Self::Location),
            "sample" => Ok(Self::Sample),
            "parameter" => Ok(Self::Parameter),
            _ => Err(format!("Invalid tag target kind: {}", s)),
        }
    }
}

/// The record a tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TagTarget {
    pub kind: TargetKind,
    pub id: Uuid,
}

impl TagTarget {
    pub fn location(id: Uuid) -> Self {
        Self {
            kind: TargetKind::Location,
            id,
        }
    }

    pub fn sample(id: Uuid) -> Self {
        Self {
            kind: TargetKind::Sample,
            id,
        }
    }

    pub fn parameter(id: Uuid) -> Self {
        Self {
            kind: TargetKind::Parameter,
            id,
        }
    }
}

impl std::fmt::Display for TagTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A key/value annotation whose key is a [`Term`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Tag {
    pub id: Uuid,
    pub term_id: Uuid,
    /// Slug of the key term, joined in on read.
    pub term_slug: String,
    #[serde(default)]
    pub value: String,
    pub target: TagTarget,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=\"{}\"", self.term_slug, self.value)
    }
}

// =============================================================================
// LOCATIONS
// =============================================================================

/// A named place; locations nest through `parent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub description: String,
    /// Opaque geometry payload (e.g. WKT or GeoJSON text).
    #[serde(default)]
    pub geometry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Request to create a location.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NewLocation {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub geometry: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

// =============================================================================
// SAMPLES
// =============================================================================

/// A physical sample. The slug is generated on first insert and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Sample {
    pub id: Uuid,
    /// Optional display name; empty when not given.
    #[serde(default)]
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Display for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.slug)
    }
}

/// Request to create a sample. There is no slug field: slugs are generated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NewSample {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location_id: Option<Uuid>,
    #[serde(default)]
    pub created_by: Option<String>,
}

// =============================================================================
// PARAMETERS
// =============================================================================

/// A measurable quantity; the validators constrain measurement values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Parameter {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub description: String,
    /// JSON list of validator references applied to measurement values.
    #[serde(default)]
    pub validators: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Request to create a parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NewParameter {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub validators: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

// =============================================================================
// MEASUREMENTS
// =============================================================================

/// A value of a [`Parameter`] observed on a [`Sample`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Measurement {
    pub id: Uuid,
    pub sample_id: Uuid,
    pub parameter_id: Uuid,
    #[serde(default)]
    pub value: String,
    /// JSON object text; empty means no tags.
    #[serde(default)]
    pub tags: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Measurement {
    /// Parse the tags blob. Empty tags parse to an empty map.
    pub fn parse_tags(&self) -> Result<Map<String, JsonValue>> {
        validate_json_dict(Some(&self.tags))
    }

    /// Merge key/value pairs into the tags blob, overwriting existing keys.
    pub fn set_tags<I, K>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        let mut tags = self.parse_tags()?;
        for (key, value) in pairs {
            tags.insert(key.into(), value);
        }
        self.tags = serde_json::to_string(&tags)?;
        Ok(())
    }

    /// Human-readable form, e.g. `pH = 6.8 {"method":"probe"}`.
    ///
    /// Output with tags is cut to 147 characters plus `...`.
    pub fn describe(&self, parameter_name: &str) -> String {
        if self.tags.is_empty() {
            return format!("{} = {}", parameter_name, self.value);
        }
        let out = format!("{} = {} {}", parameter_name, self.value, self.tags);
        match out.char_indices().nth(MEASUREMENT_DISPLAY_LEN) {
            Some((cut, _)) => format!("{}...", &out[..cut]),
            None => out,
        }
    }
}

/// Request to record a measurement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NewMeasurement {
    pub sample_id: Uuid,
    pub parameter_id: Uuid,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn measurement(value: &str, tags: &str) -> Measurement {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        Measurement {
            id: Uuid::nil(),
            sample_id: Uuid::nil(),
            parameter_id: Uuid::nil(),
            value: value.to_string(),
            tags: tags.to_string(),
            created_by: None,
            created_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn test_target_kind_round_trip() {
        for kind in [TargetKind::Location, TargetKind::Sample, TargetKind::Parameter] {
            let parsed: TargetKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("note".parse::<TargetKind>().is_err());
        assert_eq!("SAMPLE".parse::<TargetKind>().unwrap(), TargetKind::Sample);
    }

    #[test]
    fn test_tag_display() {
        let tag = Tag {
            id: Uuid::nil(),
            term_id: Uuid::nil(),
            term_slug: "soil-type".to_string(),
            value: "loam".to_string(),
            target: TagTarget::sample(Uuid::nil()),
            created_at: Utc::now(),
        };
        assert_eq!(tag.to_string(), r#"soil-type="loam""#);
    }

    #[test]
    fn test_tag_target_serializes_kind_and_id() {
        let target = TagTarget::parameter(Uuid::nil());
        let v = serde_json::to_value(target).unwrap();
        assert_eq!(v["kind"], "parameter");
        assert_eq!(v["id"], Uuid::nil().to_string());
    }

    #[test]
    fn test_parse_tags_empty_is_empty_map() {
        let m = measurement("6.8", "");
        assert!(m.parse_tags().unwrap().is_empty());
    }

    #[test]
    fn test_parse_tags_rejects_non_object() {
        let m = measurement("6.8", "[1, 2]");
        assert!(m.parse_tags().is_err());
    }

    #[test]
    fn test_set_tags_merges_and_overwrites() {
        let mut m = measurement("6.8", r#"{"method": "probe", "rep": 1}"#);
        m.set_tags([("rep", json!(2)), ("operator", json!("jdoe"))])
            .unwrap();

        let tags = m.parse_tags().unwrap();
        assert_eq!(tags["method"], json!("probe"));
        assert_eq!(tags["rep"], json!(2));
        assert_eq!(tags["operator"], json!("jdoe"));
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn test_set_tags_on_empty_blob() {
        let mut m = measurement("6.8", "");
        m.set_tags([("flag", json!(true))]).unwrap();
        assert_eq!(m.tags, r#"{"flag":true}"#);
    }

    #[test]
    fn test_describe_without_tags() {
        assert_eq!(measurement("6.8", "").describe("pH"), "pH = 6.8");
    }

    #[test]
    fn test_describe_with_short_tags() {
        let m = measurement("6.8", r#"{"a":1}"#);
        assert_eq!(m.describe("pH"), r#"pH = 6.8 {"a":1}"#);
    }

    #[test]
    fn test_describe_truncates_long_output() {
        let long = format!(r#"{{"note":"{}"}}"#, "x".repeat(300));
        let out = measurement("6.8", &long).describe("pH");
        assert_eq!(out.chars().count(), 150);
        assert!(out.ends_with("..."));
        assert!(out.starts_with("pH = 6.8 {"));
    }

    #[test]
    fn test_describe_exactly_at_limit_is_untouched() {
        // "p = v " is 6 chars, so 141 chars of tags lands exactly on 147.
        let tags = "t".repeat(141);
        let out = measurement("v", &tags).describe("p");
        assert_eq!(out.chars().count(), 147);
        assert!(!out.ends_with("..."));
    }

    #[test]
    fn test_new_sample_deserializes_with_defaults() {
        let req: NewSample = serde_json::from_str("{}").unwrap();
        assert!(req.name.is_none());
        assert!(req.location_id.is_none());
    }
}
