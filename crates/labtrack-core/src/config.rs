//! Runtime configuration.
//!
//! Configuration is read from environment variables (the `labtrack` binary
//! loads a `.env` file first):
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATABASE_URL` | none (required by the database layer) |
//! | `LABTRACK_DB_MAX_CONNECTIONS` | 10 |
//! | `LABTRACK_SLUG_MAX_LEN` | 55 (also the upper bound, the width of `sample.slug`) |
//! | `LABTRACK_LOCATION_PREFIX_LEN` | 10 |
//! | `LABTRACK_SLUG_INSERT_RETRIES` | 3 |
//!
//! # Example
//!
//! ```
//! use labtrack_core::config::LabConfig;
//!
//! let config = LabConfig::from_lookup(|key| match key {
//!     "LABTRACK_SLUG_MAX_LEN" => Some("48".to_string()),
//!     _ => None,
//! })
//! .unwrap();
//! assert_eq!(config.slug.max_len, 48);
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::defaults;
use crate::error::{Error, Result};

pub const ENV_DB_MAX_CONNECTIONS: &str = "LABTRACK_DB_MAX_CONNECTIONS";
pub const ENV_SLUG_MAX_LEN: &str = "LABTRACK_SLUG_MAX_LEN";
pub const ENV_LOCATION_PREFIX_LEN: &str = "LABTRACK_LOCATION_PREFIX_LEN";
pub const ENV_SLUG_INSERT_RETRIES: &str = "LABTRACK_SLUG_INSERT_RETRIES";

/// Sample slug shaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlugConfig {
    /// Candidates are cut to this many characters before the uniqueness check.
    pub max_len: usize,
    /// Leading characters of the location slug included in a sample slug.
    pub location_prefix_len: usize,
}

impl Default for SlugConfig {
    fn default() -> Self {
        Self {
            max_len: defaults::SLUG_MAX_LEN,
            location_prefix_len: defaults::LOCATION_PREFIX_LEN,
        }
    }
}

/// Top-level labtrack configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub slug: SlugConfig,
    /// Attempts to insert a sample when its slug is taken concurrently.
    pub slug_insert_retries: u32,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: defaults::DB_MAX_CONNECTIONS,
            slug: SlugConfig::default(),
            slug_insert_retries: defaults::SLUG_INSERT_RETRIES,
        }
    }
}

impl LabConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();
        let config = Self {
            database_url: lookup(defaults::ENV_DATABASE_URL).filter(|v| !v.trim().is_empty()),
            db_max_connections: parse_or(&lookup, ENV_DB_MAX_CONNECTIONS, base.db_max_connections)?,
            slug: SlugConfig {
                max_len: parse_or(&lookup, ENV_SLUG_MAX_LEN, base.slug.max_len)?,
                location_prefix_len: parse_or(
                    &lookup,
                    ENV_LOCATION_PREFIX_LEN,
                    base.slug.location_prefix_len,
                )?,
            },
            slug_insert_retries: parse_or(
                &lookup,
                ENV_SLUG_INSERT_RETRIES,
                base.slug_insert_retries,
            )?,
        };
        config.validate()?;
        debug!(
            subsystem = "config",
            slug_max_len = config.slug.max_len,
            location_prefix_len = config.slug.location_prefix_len,
            slug_insert_retries = config.slug_insert_retries,
            has_database_url = config.database_url.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.slug.max_len < defaults::UUID_STR_LEN {
            return Err(Error::Config(format!(
                "slug max_len must be at least {} so the id fallback fits, got {}",
                defaults::UUID_STR_LEN,
                self.slug.max_len
            )));
        }
        if self.slug.max_len > defaults::SLUG_MAX_LEN {
            return Err(Error::Config(format!(
                "slug max_len cannot exceed {}, got {}",
                defaults::SLUG_MAX_LEN,
                self.slug.max_len
            )));
        }
        if self.slug.location_prefix_len == 0 {
            return Err(Error::Config(
                "location_prefix_len cannot be zero".to_string(),
            ));
        }
        if self.slug_insert_retries == 0 {
            return Err(Error::Config(
                "slug_insert_retries cannot be zero".to_string(),
            ));
        }
        if self.db_max_connections == 0 {
            return Err(Error::Config(
                "db_max_connections cannot be zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The database URL, or a configuration error naming the variable.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            Error::Config(format!("{} is not set", defaults::ENV_DATABASE_URL))
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{}={:?}: {}", key, raw, e))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = LabConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, LabConfig::default());
        assert_eq!(config.slug.max_len, 55);
        assert_eq!(config.slug.location_prefix_len, 10);
        assert_eq!(config.slug_insert_retries, 3);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = LabConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://lab@localhost/lab"),
            ("LABTRACK_DB_MAX_CONNECTIONS", "4"),
            ("LABTRACK_LOCATION_PREFIX_LEN", " 8 "),
        ]))
        .unwrap();
        assert_eq!(
            config.require_database_url().unwrap(),
            "postgres://lab@localhost/lab"
        );
        assert_eq!(config.db_max_connections, 4);
        assert_eq!(config.slug.location_prefix_len, 8);
    }

    #[test]
    fn test_unparseable_value_is_config_error() {
        let err = LabConfig::from_lookup(lookup_from(&[("LABTRACK_SLUG_MAX_LEN", "wide")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("LABTRACK_SLUG_MAX_LEN")));
    }

    #[test]
    fn test_slug_len_must_fit_fallback() {
        let err = LabConfig::from_lookup(lookup_from(&[("LABTRACK_SLUG_MAX_LEN", "20")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_slug_len_capped_at_column_width() {
        let err = LabConfig::from_lookup(lookup_from(&[("LABTRACK_SLUG_MAX_LEN", "56")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("cannot exceed 55")));

        let config =
            LabConfig::from_lookup(lookup_from(&[("LABTRACK_SLUG_MAX_LEN", "55")])).unwrap();
        assert_eq!(config.slug.max_len, 55);
    }

    #[test]
    fn test_zero_retries_rejected() {
        let config = LabConfig {
            slug_insert_retries: 0,
            ..LabConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_database_url() {
        let config = LabConfig::from_lookup(lookup_from(&[("DATABASE_URL", "  ")])).unwrap();
        let err = config.require_database_url().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
