//! Field validators for semi-structured text columns.
//!
//! Every validator takes the raw text of a field and either returns the
//! parsed value or fails with [`Error::Validation`]. Empty text is valid for
//! all of them: the JSON validators yield no value (or an empty container)
//! and the numeric validator yields `None`.
//!
//! Terms and parameters carry a `validators` column holding a JSON list of
//! *validator references*. A reference is resolved through a
//! [`ValidatorRegistry`]:
//!
//! 1. a registered name resolves to that validator function;
//! 2. an unregistered name starting with `validate_` is an error;
//! 3. anything else is compiled as a regular expression which the value must
//!    match (patterns are not anchored implicitly, write `^...$` for a full
//!    match).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::{Error, Result};

/// Prefix reserved for registered validator names.
pub const VALIDATOR_NAME_PREFIX: &str = "validate_";

// =============================================================================
// JSON VALIDATORS
// =============================================================================

/// Runtime shape of a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonKind {
    Object,
    Array,
    String,
    Number,
    Bool,
    Null,
}

impl JsonKind {
    pub fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Object(_) => Self::Object,
            JsonValue::Array(_) => Self::Array,
            JsonValue::String(_) => Self::String,
            JsonValue::Number(_) => Self::Number,
            JsonValue::Bool(_) => Self::Bool,
            JsonValue::Null => Self::Null,
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "object"),
            Self::Array => write!(f, "array"),
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Bool => write!(f, "bool"),
            Self::Null => write!(f, "null"),
        }
    }
}

fn is_empty(value: Option<&str>) -> bool {
    value.map_or(true, str::is_empty)
}

/// Parse a text field as JSON.
///
/// Empty or absent input is valid and yields `None`. With `expected` set, a
/// value of any other shape is rejected.
pub fn validate_json(value: Option<&str>, expected: Option<JsonKind>) -> Result<Option<JsonValue>> {
    let text = match value {
        Some(text) if !text.is_empty() => text,
        _ => return Ok(None),
    };

    let parsed: JsonValue =
        serde_json::from_str(text).map_err(|e| Error::validation(format!("Invalid JSON: {}", e)))?;

    if let Some(kind) = expected {
        let actual = JsonKind::of(&parsed);
        if actual != kind {
            return Err(Error::validation(format!(
                "Expected JSON {}, got {}",
                kind, actual
            )));
        }
    }
    Ok(Some(parsed))
}

/// Parse a text field as a JSON object. Empty input yields an empty map.
pub fn validate_json_dict(value: Option<&str>) -> Result<Map<String, JsonValue>> {
    match validate_json(value, Some(JsonKind::Object))? {
        Some(JsonValue::Object(map)) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Parse a text field as a JSON array. Empty input yields an empty vector.
pub fn validate_json_list(value: Option<&str>) -> Result<Vec<JsonValue>> {
    match validate_json(value, Some(JsonKind::Array))? {
        Some(JsonValue::Array(items)) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

/// Check that a field is a JSON list of strings.
///
/// This only checks shape. Use [`ValidatorRegistry::validate_references`] to
/// also resolve every reference.
pub fn validate_validator_list(value: Option<&str>) -> Result<Vec<String>> {
    validate_json_list(value)?
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            JsonValue::String(s) => Ok(s),
            other => Err(Error::validation(format!(
                "Validator reference at index {} must be a string, got {}",
                i,
                JsonKind::of(&other)
            ))),
        })
        .collect()
}

// =============================================================================
// NUMERIC VALIDATORS
// =============================================================================

/// Parse a field as a finite number within `[min, max]`.
///
/// Both bounds are inclusive and optional. Empty input yields `None`.
pub fn validate_numeric_range(
    value: Option<&str>,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<Option<f64>> {
    if is_empty(value) {
        return Ok(None);
    }
    let text = value.unwrap_or_default().trim();
    let number: f64 = text
        .parse()
        .map_err(|_| Error::validation(format!("Expected a number, got {:?}", text)))?;
    if !number.is_finite() {
        return Err(Error::validation(format!(
            "Expected a finite number, got {:?}",
            text
        )));
    }
    if let Some(lo) = min {
        if number < lo {
            return Err(Error::validation(format!(
                "{} is below the minimum {}",
                number, lo
            )));
        }
    }
    if let Some(hi) = max {
        if number > hi {
            return Err(Error::validation(format!(
                "{} is above the maximum {}",
                number, hi
            )));
        }
    }
    Ok(Some(number))
}

// =============================================================================
// REGISTRY
// =============================================================================

/// A registered validator function.
pub type ValidatorFn = Arc<dyn Fn(&str) -> Result<Option<JsonValue>> + Send + Sync>;

/// Build a registrable numeric range validator.
///
/// ```
/// use labtrack_core::validators::{numeric_range_validator, ValidatorRegistry};
///
/// let mut registry = ValidatorRegistry::with_builtins();
/// registry.register_fn("validate_ph", numeric_range_validator(Some(0.0), Some(14.0)));
/// assert!(registry.apply(r#"["validate_ph"]"#, "6.8").is_ok());
/// assert!(registry.apply(r#"["validate_ph"]"#, "15").is_err());
/// ```
pub fn numeric_range_validator(min: Option<f64>, max: Option<f64>) -> ValidatorFn {
    Arc::new(move |value: &str| -> Result<Option<JsonValue>> {
        Ok(validate_numeric_range(Some(value), min, max)?.map(JsonValue::from))
    })
}

/// A validator reference after resolution.
#[derive(Clone)]
pub enum ResolvedValidator {
    Function { name: String, validator: ValidatorFn },
    Pattern(Regex),
}

impl ResolvedValidator {
    /// The reference text this was resolved from.
    pub fn reference(&self) -> &str {
        match self {
            Self::Function { name, .. } => name,
            Self::Pattern(re) => re.as_str(),
        }
    }

    /// Run the validator against a field value.
    pub fn check(&self, value: &str) -> Result<()> {
        match self {
            Self::Function { name, validator } => validator(value)
                .map(|_| ())
                .map_err(|e| match e {
                    Error::Validation(msg) => Error::Validation(format!("{}: {}", name, msg)),
                    other => other,
                }),
            Self::Pattern(re) if re.is_match(value) => Ok(()),
            Self::Pattern(re) => Err(Error::validation(format!(
                "Value {:?} does not match pattern {}",
                value,
                re.as_str()
            ))),
        }
    }
}

impl fmt::Debug for ResolvedValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function { name, .. } => f.debug_tuple("Function").field(name).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
        }
    }
}

/// Name-to-function map used to resolve validator references.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, ValidatorFn>,
}

impl ValidatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in validators:
    /// `validate_json`, `validate_json_dict`, `validate_json_list`,
    /// `validate_validator_list`, and `validate_numeric`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register("validate_json", |v| validate_json(Some(v), None))
            .register("validate_json_dict", |v| {
                validate_json_dict(Some(v)).map(|m| Some(JsonValue::Object(m)))
            })
            .register("validate_json_list", |v| {
                validate_json_list(Some(v)).map(|l| Some(JsonValue::Array(l)))
            })
            .register("validate_validator_list", |v| {
                validate_validator_list(Some(v))
                    .map(|refs| Some(JsonValue::from(refs)))
            })
            .register_fn("validate_numeric", numeric_range_validator(None, None));
        registry
    }

    /// Register a validator under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, validator: F) -> &mut Self
    where
        F: Fn(&str) -> Result<Option<JsonValue>> + Send + Sync + 'static,
    {
        self.register_fn(name, Arc::new(validator))
    }

    /// Register an already shared validator function.
    pub fn register_fn(&mut self, name: impl Into<String>, validator: ValidatorFn) -> &mut Self {
        self.validators.insert(name.into(), validator);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up a registered validator by name.
    pub fn get(&self, name: &str) -> Result<ValidatorFn> {
        self.validators
            .get(name)
            .cloned()
            .ok_or_else(|| Error::validation(format!("Unknown validator: {}", name)))
    }

    /// Resolve one reference to a function or a compiled pattern.
    pub fn resolve(&self, reference: &str) -> Result<ResolvedValidator> {
        if let Some(validator) = self.validators.get(reference) {
            return Ok(ResolvedValidator::Function {
                name: reference.to_string(),
                validator: validator.clone(),
            });
        }
        if reference.starts_with(VALIDATOR_NAME_PREFIX) {
            return Err(Error::validation(format!("Unknown validator: {}", reference)));
        }
        let re = Regex::new(reference).map_err(|e| {
            Error::validation(format!(
                "Validator reference {:?} is neither a registered validator nor a valid pattern: {}",
                reference, e
            ))
        })?;
        debug!(
            subsystem = "catalog",
            component = "validators",
            op = "resolve",
            validator = reference,
            "Treating validator reference as a pattern"
        );
        Ok(ResolvedValidator::Pattern(re))
    }

    /// Check that a field is a JSON list of resolvable references.
    pub fn validate_references(&self, value: Option<&str>) -> Result<Vec<ResolvedValidator>> {
        validate_validator_list(value)?
            .iter()
            .map(|reference| self.resolve(reference))
            .collect()
    }

    /// Run every referenced validator against `value`, stopping at the first failure.
    pub fn apply(&self, references: &str, value: &str) -> Result<()> {
        for validator in self.validate_references(Some(references))? {
            validator.check(value)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("validators", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn is_validation(result: Result<impl fmt::Debug>) -> bool {
        matches!(result, Err(Error::Validation(_)))
    }

    // ---- validate_json ----

    #[test]
    fn test_validate_json_empty_is_none() {
        assert_eq!(validate_json(None, None).unwrap(), None);
        assert_eq!(validate_json(Some(""), None).unwrap(), None);
        assert_eq!(validate_json(Some(""), Some(JsonKind::Object)).unwrap(), None);
    }

    #[test]
    fn test_validate_json_parses_any_shape() {
        assert_eq!(validate_json(Some("5"), None).unwrap(), Some(json!(5)));
        assert_eq!(validate_json(Some("null"), None).unwrap(), Some(json!(null)));
        assert_eq!(
            validate_json(Some(r#"{"a": [1]}"#), None).unwrap(),
            Some(json!({"a": [1]}))
        );
    }

    #[test]
    fn test_validate_json_syntax_error_carries_parse_message() {
        let err = validate_json(Some("{not json"), None).unwrap_err();
        match err {
            Error::Validation(msg) => {
                assert!(msg.starts_with("Invalid JSON: "));
                assert!(msg.len() > "Invalid JSON: ".len());
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_json_whitespace_only_is_invalid() {
        assert!(is_validation(validate_json(Some("   "), None)));
    }

    #[test]
    fn test_validate_json_type_mismatch() {
        let err = validate_json(Some("[1,2]"), Some(JsonKind::Object)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Expected JSON object, got array"
        );
        assert!(validate_json(Some("true"), Some(JsonKind::Bool)).is_ok());
    }

    // ---- validate_json_dict / list ----

    #[test]
    fn test_validate_json_dict_round_trips_object() {
        let text = r#"{"depth_cm": 30, "wet": true, "notes": null, "nested": {"k": [1, "x"]}}"#;
        let map = validate_json_dict(Some(text)).unwrap();
        let expected: JsonValue = serde_json::from_str(text).unwrap();
        assert_eq!(JsonValue::Object(map), expected);
    }

    #[test]
    fn test_validate_json_dict_empty_is_empty_map() {
        assert!(validate_json_dict(None).unwrap().is_empty());
        assert!(validate_json_dict(Some("")).unwrap().is_empty());
        assert!(validate_json_dict(Some("{}")).unwrap().is_empty());
    }

    #[test]
    fn test_validate_json_dict_rejects_other_shapes() {
        for text in ["[1,2]", "5", "\"s\"", "null", "true"] {
            assert!(is_validation(validate_json_dict(Some(text))), "{}", text);
        }
    }

    #[test]
    fn test_validate_json_list() {
        assert!(validate_json_list(None).unwrap().is_empty());
        assert_eq!(
            validate_json_list(Some("[1, \"a\"]")).unwrap(),
            vec![json!(1), json!("a")]
        );
        assert!(is_validation(validate_json_list(Some("{}"))));
    }

    // ---- validate_validator_list ----

    #[test]
    fn test_validator_list_accepts_names_and_patterns() {
        let refs = validate_validator_list(Some(r#"["validate_json", "^[0-9]+$"]"#)).unwrap();
        assert_eq!(refs, vec!["validate_json", "^[0-9]+$"]);
    }

    #[test]
    fn test_validator_list_shape_check_ignores_resolution() {
        let refs = validate_validator_list(Some(r#"["validate_nonexistent"]"#)).unwrap();
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn test_validator_list_rejects_non_strings() {
        let err = validate_validator_list(Some(r#"["validate_json", 3]"#)).unwrap_err();
        assert!(err.to_string().contains("index 1"));
        assert!(is_validation(validate_validator_list(Some(r#"{"a": 1}"#))));
    }

    #[test]
    fn test_validator_list_empty() {
        assert!(validate_validator_list(None).unwrap().is_empty());
        assert!(validate_validator_list(Some("[]")).unwrap().is_empty());
    }

    // ---- validate_numeric_range ----

    #[test]
    fn test_numeric_range_inclusive_bounds() {
        assert_eq!(
            validate_numeric_range(Some("0"), Some(0.0), Some(14.0)).unwrap(),
            Some(0.0)
        );
        assert_eq!(
            validate_numeric_range(Some("14"), Some(0.0), Some(14.0)).unwrap(),
            Some(14.0)
        );
        assert!(is_validation(validate_numeric_range(
            Some("14.01"),
            Some(0.0),
            Some(14.0)
        )));
        assert!(is_validation(validate_numeric_range(
            Some("-0.5"),
            Some(0.0),
            Some(14.0)
        )));
    }

    #[test]
    fn test_numeric_range_bounds_are_independent() {
        assert!(validate_numeric_range(Some("1e9"), Some(0.0), None).is_ok());
        assert!(validate_numeric_range(Some("-1e9"), None, Some(0.0)).is_ok());
        assert!(is_validation(validate_numeric_range(Some("1"), None, Some(0.0))));
        assert_eq!(
            validate_numeric_range(Some(" 6.8 "), None, None).unwrap(),
            Some(6.8)
        );
    }

    #[test]
    fn test_numeric_range_rejects_garbage_and_non_finite() {
        assert!(is_validation(validate_numeric_range(Some("abc"), None, None)));
        assert!(is_validation(validate_numeric_range(Some("NaN"), None, None)));
        assert!(is_validation(validate_numeric_range(Some("inf"), None, None)));
    }

    #[test]
    fn test_numeric_range_empty_is_none() {
        assert_eq!(validate_numeric_range(None, Some(1.0), None).unwrap(), None);
        assert_eq!(validate_numeric_range(Some(""), Some(1.0), None).unwrap(), None);
    }

    // ---- registry ----

    #[test]
    fn test_builtin_names() {
        let registry = ValidatorRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec![
                "validate_json",
                "validate_json_dict",
                "validate_json_list",
                "validate_numeric",
                "validate_validator_list",
            ]
        );
    }

    #[test]
    fn test_get_unknown_name_is_error() {
        let registry = ValidatorRegistry::with_builtins();
        assert!(registry.get("validate_json").is_ok());
        let err = registry.get("validate_missing").err().unwrap();
        assert_eq!(err.to_string(), "Validation error: Unknown validator: validate_missing");
    }

    #[test]
    fn test_resolve_name_pattern_and_unknown() {
        let registry = ValidatorRegistry::with_builtins();
        assert!(matches!(
            registry.resolve("validate_json").unwrap(),
            ResolvedValidator::Function { .. }
        ));
        assert!(matches!(
            registry.resolve("^[0-9]+$").unwrap(),
            ResolvedValidator::Pattern(_)
        ));
        assert!(is_validation(registry.resolve("validate_typo")));
        assert!(is_validation(registry.resolve("([unclosed")));
    }

    #[test]
    fn test_validate_references_resolves_every_entry() {
        let registry = ValidatorRegistry::with_builtins();
        let resolved = registry
            .validate_references(Some(r#"["validate_json", "^[0-9]+$"]"#))
            .unwrap();
        let refs: Vec<&str> = resolved.iter().map(|r| r.reference()).collect();
        assert_eq!(refs, vec!["validate_json", "^[0-9]+$"]);

        assert!(registry
            .validate_references(Some(r#"["validate_json", "validate_nope"]"#))
            .is_err());
    }

    #[test]
    fn test_apply_pattern() {
        let registry = ValidatorRegistry::with_builtins();
        assert!(registry.apply(r#"["^[0-9]+$"]"#, "42").is_ok());
        let err = registry.apply(r#"["^[0-9]+$"]"#, "4x2").unwrap_err();
        assert!(err.to_string().contains("does not match pattern"));
    }

    #[test]
    fn test_apply_function_prefixes_name_on_failure() {
        let registry = ValidatorRegistry::with_builtins();
        let err = registry
            .apply(r#"["validate_json_dict"]"#, "[1]")
            .unwrap_err();
        assert!(err.to_string().contains("validate_json_dict: Expected JSON object"));
    }

    #[test]
    fn test_apply_runs_all_validators() {
        let registry = ValidatorRegistry::with_builtins();
        let refs = r#"["validate_numeric", "^\\d+(\\.\\d+)?$"]"#;
        assert!(registry.apply(refs, "6.8").is_ok());
        // Numeric but fails the pattern.
        assert!(registry.apply(refs, "-6.8").is_err());
        // Matches nothing numeric.
        assert!(registry.apply(refs, "six").is_err());
    }

    #[test]
    fn test_apply_empty_reference_list_accepts_anything() {
        let registry = ValidatorRegistry::with_builtins();
        assert!(registry.apply("", "anything").is_ok());
        assert!(registry.apply("[]", "anything").is_ok());
    }

    #[test]
    fn test_register_custom_validator() {
        let mut registry = ValidatorRegistry::with_builtins();
        registry.register("validate_upper", |v| {
            if v.chars().all(|c| !c.is_lowercase()) {
                Ok(None)
            } else {
                Err(Error::validation("must be upper case"))
            }
        });
        assert!(registry.contains("validate_upper"));
        assert!(registry.apply(r#"["validate_upper"]"#, "ABC").is_ok());
        assert!(registry.apply(r#"["validate_upper"]"#, "AbC").is_err());
    }

    #[test]
    fn test_numeric_range_validator_registration() {
        let mut registry = ValidatorRegistry::new();
        registry.register_fn("validate_ph", numeric_range_validator(Some(0.0), Some(14.0)));
        let v = registry.get("validate_ph").unwrap();
        assert_eq!(v("7").unwrap(), Some(json!(7.0)));
        assert!(v("14.5").is_err());
    }

    #[test]
    fn test_registry_debug_lists_names() {
        let registry = ValidatorRegistry::with_builtins();
        let debug = format!("{:?}", registry);
        assert!(debug.contains("validate_json_dict"));
    }
}
