//! Write-path tests against the in-memory store.
//!
//! These exercise the catalog end to end: slug generation with real
//! collisions, validator enforcement before persistence, tag timestamp
//! propagation, and the protect/cascade rules on delete.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use labtrack_core::{
    Catalog, Error, FixedClock, LabConfig, MemoryStore, NewLocation, NewMeasurement, NewParameter,
    NewSample, NewTerm, ParameterRepository, SampleRepository, TagTarget, ValidatorRegistry,
};
use serde_json::json;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 14, 22, 9).unwrap()
}

fn setup() -> (Catalog<MemoryStore>, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(start()));
    let catalog = Catalog::with_parts(
        MemoryStore::new(),
        clock.clone(),
        ValidatorRegistry::with_builtins(),
        LabConfig::default(),
    );
    (catalog, clock)
}

async fn north_field(catalog: &Catalog<MemoryStore>) -> uuid::Uuid {
    catalog
        .create_location(NewLocation {
            name: "North Field Site".to_string(),
            slug: Some("north-field-site".to_string()),
            ..Default::default()
        })
        .await
        .expect("create location")
        .id
}

fn soil_core(location_id: uuid::Uuid) -> NewSample {
    NewSample {
        name: Some("Soil Core A".to_string()),
        location_id: Some(location_id),
        created_by: Some("jdoe".to_string()),
        ..Default::default()
    }
}

// =============================================================================
// SAMPLE SLUGS
// =============================================================================

#[tokio::test]
async fn test_sample_slug_matches_documented_example() {
    let (catalog, _) = setup();
    let loc = north_field(&catalog).await;

    let sample = catalog.create_sample(soil_core(loc)).await.unwrap();
    assert_eq!(sample.slug, "jdoe_2024-03-01_north-fiel_soil-core-a");
    assert_eq!(sample.to_string(), sample.slug);
    assert_eq!(sample.created_at, start());
}

#[tokio::test]
async fn test_identical_samples_get_distinct_slugs_in_precedence_order() {
    let (catalog, _) = setup();
    let loc = north_field(&catalog).await;

    let a = catalog.create_sample(soil_core(loc)).await.unwrap();
    let b = catalog.create_sample(soil_core(loc)).await.unwrap();
    let c = catalog.create_sample(soil_core(loc)).await.unwrap();
    let d = catalog.create_sample(soil_core(loc)).await.unwrap();

    assert_eq!(a.slug, "jdoe_2024-03-01_north-fiel_soil-core-a");
    assert_eq!(b.slug, "jdoe_2024-03-01T14.22.9_north-fiel_soil-core-a");
    assert_eq!(c.slug, "jdoe_2024-03-01T14.22.09_north-fiel_soil-core-a");
    assert_eq!(d.slug, d.id.to_string());
}

#[tokio::test]
async fn test_same_day_later_instant_still_collides_on_date_only() {
    let (catalog, clock) = setup();
    let loc = north_field(&catalog).await;

    let a = catalog.create_sample(soil_core(loc)).await.unwrap();
    clock.advance(Duration::hours(2));
    let b = catalog.create_sample(soil_core(loc)).await.unwrap();

    assert_ne!(a.slug, b.slug);
    assert_eq!(b.slug, "jdoe_2024-03-01T16.22.9_north-fiel_soil-core-a");
}

#[tokio::test]
async fn test_collected_time_drives_slug_date() {
    let (catalog, _) = setup();
    let collected = Utc.with_ymd_and_hms(2023, 11, 5, 6, 0, 0).unwrap();
    let sample = catalog
        .create_sample(NewSample {
            collected_at: Some(collected),
            created_by: Some("jdoe".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(sample.slug, "jdoe_2023-11-05");
}

#[tokio::test]
async fn test_slugs_never_exceed_limit() {
    let (catalog, _) = setup();
    let loc = north_field(&catalog).await;
    for _ in 0..5 {
        let sample = catalog
            .create_sample(NewSample {
                name: Some("A twenty-five char name!!".to_string()),
                location_id: Some(loc),
                created_by: Some("a-rather-long-user-name".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(sample.slug.chars().count() <= 55, "{}", sample.slug);
    }
}

#[tokio::test]
async fn test_slug_race_is_retried_with_next_candidate() {
    let (catalog, _) = setup();
    let loc = north_field(&catalog).await;

    // Another writer commits the date-only slug right after our lookup.
    catalog
        .store()
        .claim_slug_after_next_lookup("jdoe_2024-03-01_north-fiel_soil-core-a")
        .await;

    let sample = catalog.create_sample(soil_core(loc)).await.unwrap();
    assert_eq!(sample.slug, "jdoe_2024-03-01T14.22.9_north-fiel_soil-core-a");
}

#[tokio::test]
async fn test_slug_race_exhausts_retries() {
    let clock = Arc::new(FixedClock::new(start()));
    let catalog = Catalog::with_parts(
        MemoryStore::new(),
        clock,
        ValidatorRegistry::with_builtins(),
        LabConfig {
            slug_insert_retries: 1,
            ..LabConfig::default()
        },
    );
    catalog
        .store()
        .claim_slug_after_next_lookup("jdoe_2024-03-01")
        .await;

    let err = catalog
        .create_sample(NewSample {
            created_by: Some("jdoe".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(err.is_slug_conflict());
}

#[tokio::test]
async fn test_rename_keeps_slug() {
    let (catalog, clock) = setup();
    let loc = north_field(&catalog).await;
    let sample = catalog.create_sample(soil_core(loc)).await.unwrap();

    clock.advance(Duration::minutes(5));
    let renamed = catalog.rename_sample(sample.id, "Core A (dup)").await.unwrap();
    assert_eq!(renamed.name, "Core A (dup)");
    assert_eq!(renamed.slug, sample.slug);
    assert_eq!(renamed.updated_at, start() + Duration::minutes(5));
    assert_eq!(
        catalog.sample_by_slug(&sample.slug).await.unwrap().id,
        sample.id
    );
}

#[tokio::test]
async fn test_sample_name_limit() {
    let (catalog, _) = setup();
    let err = catalog
        .create_sample(NewSample {
            name: Some("x".repeat(26)),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(catalog.store().list_samples(None).await.unwrap().len(), 0);
}

#[tokio::test]
async fn test_sample_unknown_location_is_not_found() {
    let (catalog, _) = setup();
    let err = catalog
        .create_sample(NewSample {
            location_id: Some(uuid::Uuid::new_v4()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// =============================================================================
// VALIDATORS ON THE WRITE PATH
// =============================================================================

#[tokio::test]
async fn test_parameter_with_bad_validator_list_is_not_stored() {
    let (catalog, _) = setup();
    for validators in ["not json", r#"{"a": 1}"#, r#"[1]"#, r#"["validate_typo"]"#, r#"["(["]"#] {
        let err = catalog
            .create_parameter(NewParameter {
                name: "pH".to_string(),
                validators: validators.to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{}", validators);
    }
    assert!(catalog
        .store()
        .list_parameters(None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_measurement_value_checked_against_parameter_validators() {
    let (catalog, _) = setup();
    let sample = catalog.create_sample(NewSample::default()).await.unwrap();
    let count = catalog
        .create_parameter(NewParameter {
            name: "Colony Count".to_string(),
            validators: r#"["validate_numeric", "^[0-9]+$"]"#.to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let ok = catalog
        .record_measurement(NewMeasurement {
            sample_id: sample.id,
            parameter_id: count.id,
            value: "42".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(ok.describe(&count.name), "Colony Count = 42");

    let err = catalog
        .record_measurement(NewMeasurement {
            sample_id: sample.id,
            parameter_id: count.id,
            value: "4.2".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let stored = catalog.measurements_for_sample(sample.id).await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_registered_range_validator_on_parameter() {
    let clock = Arc::new(FixedClock::new(start()));
    let mut registry = ValidatorRegistry::with_builtins();
    registry.register_fn(
        "validate_ph",
        labtrack_core::numeric_range_validator(Some(0.0), Some(14.0)),
    );
    let catalog = Catalog::with_parts(MemoryStore::new(), clock, registry, LabConfig::default());

    let sample = catalog.create_sample(NewSample::default()).await.unwrap();
    let ph = catalog
        .create_parameter(NewParameter {
            name: "pH".to_string(),
            validators: r#"["validate_ph"]"#.to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    for (value, ok) in [("7.1", true), ("0", true), ("14", true), ("14.2", false)] {
        let result = catalog
            .record_measurement(NewMeasurement {
                sample_id: sample.id,
                parameter_id: ph.id,
                value: value.to_string(),
                ..Default::default()
            })
            .await;
        assert_eq!(result.is_ok(), ok, "{}", value);
    }
}

#[tokio::test]
async fn test_measurement_tags_must_be_object_and_merge() {
    let (catalog, clock) = setup();
    let sample = catalog.create_sample(NewSample::default()).await.unwrap();
    let param = catalog
        .create_parameter(NewParameter {
            name: "Depth".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let err = catalog
        .record_measurement(NewMeasurement {
            sample_id: sample.id,
            parameter_id: param.id,
            value: "30".to_string(),
            tags: "[1, 2]".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let m = catalog
        .record_measurement(NewMeasurement {
            sample_id: sample.id,
            parameter_id: param.id,
            value: "30".to_string(),
            tags: r#"{ "unit": "cm" }"#.to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(m.tags, r#"{"unit":"cm"}"#);

    clock.advance(Duration::seconds(30));
    let merged = catalog
        .set_measurement_tags(m.id, [("replicate", json!(2)), ("unit", json!("mm"))])
        .await
        .unwrap();
    let tags = merged.parse_tags().unwrap();
    assert_eq!(tags["unit"], json!("mm"));
    assert_eq!(tags["replicate"], json!(2));
    assert_eq!(merged.updated_at, start() + Duration::seconds(30));
}

// =============================================================================
// TERMS AND TAGS
// =============================================================================

#[tokio::test]
async fn test_tag_touches_owner_and_checks_term_validators() {
    let (catalog, clock) = setup();
    let loc = north_field(&catalog).await;
    let sample = catalog.create_sample(soil_core(loc)).await.unwrap();
    let horizon = catalog
        .create_term(NewTerm {
            name: "Soil Horizon".to_string(),
            validators: r#"["^[OAEBCR]$"]"#.to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(horizon.slug, "soil-horizon");

    let err = catalog
        .add_tag(TagTarget::sample(sample.id), horizon.id, "Z")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    clock.advance(Duration::hours(1));
    let tag = catalog
        .add_tag(TagTarget::sample(sample.id), horizon.id, "B")
        .await
        .unwrap();
    assert_eq!(tag.to_string(), r#"soil-horizon="B""#);

    let touched = catalog.sample(sample.id).await.unwrap();
    assert_eq!(touched.updated_at, start() + Duration::hours(1));
    assert_eq!(touched.created_at, start());

    let tags = catalog.tags_for(TagTarget::sample(sample.id)).await.unwrap();
    assert_eq!(tags, vec![tag]);
}

#[tokio::test]
async fn test_tag_on_missing_target_is_not_found() {
    let (catalog, _) = setup();
    let term = catalog
        .create_term(NewTerm {
            name: "Crop".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let err = catalog
        .add_tag(TagTarget::parameter(uuid::Uuid::new_v4()), term.id, "wheat")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_term_name_and_slug_unique() {
    let (catalog, _) = setup();
    catalog
        .create_term(NewTerm {
            name: "Crop Type".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let err = catalog
        .create_term(NewTerm {
            name: "Crop Type".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // Different name, same derived slug.
    let err = catalog
        .create_term(NewTerm {
            name: "crop type".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

// =============================================================================
// DELETE RULES
// =============================================================================

#[tokio::test]
async fn test_location_protected_by_samples_and_children() {
    let (catalog, _) = setup();
    let parent = north_field(&catalog).await;
    let child = catalog
        .create_location(NewLocation {
            name: "Plot 7".to_string(),
            parent_id: Some(parent),
            ..Default::default()
        })
        .await
        .unwrap();
    let sample = catalog.create_sample(soil_core(child.id)).await.unwrap();

    assert!(matches!(
        catalog.delete_location(parent).await,
        Err(Error::Conflict(_))
    ));
    assert!(matches!(
        catalog.delete_location(child.id).await,
        Err(Error::Conflict(_))
    ));

    catalog.delete_sample(sample.id).await.unwrap();
    catalog.delete_location(child.id).await.unwrap();
    catalog.delete_location(parent).await.unwrap();
}

#[tokio::test]
async fn test_sample_delete_cascades_measurements_and_tags() {
    let (catalog, _) = setup();
    let sample = catalog.create_sample(NewSample::default()).await.unwrap();
    let param = catalog
        .create_parameter(NewParameter {
            name: "Mass".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let term = catalog
        .create_term(NewTerm {
            name: "Batch".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    catalog
        .record_measurement(NewMeasurement {
            sample_id: sample.id,
            parameter_id: param.id,
            value: "1.5".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    catalog
        .add_tag(TagTarget::sample(sample.id), term.id, "B-12")
        .await
        .unwrap();

    // Parameter and term are protected while referenced.
    assert!(matches!(
        catalog.delete_parameter(param.id).await,
        Err(Error::Conflict(_))
    ));
    assert!(matches!(
        catalog.delete_term(term.id).await,
        Err(Error::Conflict(_))
    ));

    catalog.delete_sample(sample.id).await.unwrap();
    assert!(catalog
        .measurements_for_sample(sample.id)
        .await
        .unwrap()
        .is_empty());
    assert!(catalog
        .tags_for(TagTarget::sample(sample.id))
        .await
        .unwrap()
        .is_empty());

    catalog.delete_parameter(param.id).await.unwrap();
    catalog.delete_term(term.id).await.unwrap();
}

#[tokio::test]
async fn test_child_sample_protects_parent() {
    let (catalog, _) = setup();
    let parent = catalog.create_sample(NewSample::default()).await.unwrap();
    let child = catalog
        .create_sample(NewSample {
            parent_id: Some(parent.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_ne!(parent.slug, child.slug);
    assert!(matches!(
        catalog.delete_sample(parent.id).await,
        Err(Error::Conflict(_))
    ));
}
