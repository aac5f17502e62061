//! Centralized default constants for labtrack.
//!
//! Field limits mirror the column widths in `migrations/`. Runtime-tunable
//! values are read through [`crate::config::LabConfig`], which falls back to
//! the constants below.

// =============================================================================
// SLUGS
// =============================================================================

/// Maximum length of a generated sample slug (and of term slugs).
pub const SLUG_MAX_LEN: usize = 55;

/// Number of leading characters of the location slug used in a sample slug.
pub const LOCATION_PREFIX_LEN: usize = 10;

/// Separator between sample slug components.
pub const SLUG_SEPARATOR: &str = "_";

/// Insert attempts for a sample when a concurrent writer takes its slug.
pub const SLUG_INSERT_RETRIES: u32 = 3;

/// Length of a hyphenated UUID, the fallback sample slug.
pub const UUID_STR_LEN: usize = 36;

// =============================================================================
// FIELD LIMITS
// =============================================================================

/// Maximum length of a term name.
pub const TERM_NAME_MAX_LEN: usize = 55;

/// Maximum length of a location name.
pub const LOCATION_NAME_MAX_LEN: usize = 255;

/// Maximum length of a location or parameter slug.
pub const SLUG_FIELD_MAX_LEN: usize = 50;

/// Maximum length of a sample display name.
pub const SAMPLE_NAME_MAX_LEN: usize = 25;

/// Maximum length of a parameter name.
pub const PARAMETER_NAME_MAX_LEN: usize = 55;

// =============================================================================
// DISPLAY
// =============================================================================

/// Measurements with tags are cut to this many characters before `...`.
pub const MEASUREMENT_DISPLAY_LEN: usize = 147;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Environment variable holding the PostgreSQL URL.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
