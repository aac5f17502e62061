//! Slug derivation for URL-facing identifiers.
//!
//! [`slugify`] normalizes free text. [`generate_unique_slug`] derives a
//! sample's slug from who collected it, when, where, and what it is called:
//!
//! ```text
//! jdoe_2024-03-01_north-fiel_soil-core-a
//! user date       location   name
//! ```
//!
//! The date is tried at three increasing precisions. The first candidate not
//! already in use wins; when all three are taken the sample's own UUID is
//! used, and if even that is taken the write fails with
//! [`Error::SlugExhausted`].

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::SlugConfig;
use crate::defaults::SLUG_SEPARATOR;
use crate::error::{Error, Result};

/// Convert text to a URL-safe ASCII slug.
///
/// Decomposes to NFKD and drops what is left outside ASCII, so accented
/// letters keep their base letter (`Café` becomes `cafe`). Then lowercases,
/// keeps alphanumerics, turns runs of whitespace, `-`, and `_` into a single
/// hyphen, and drops all other punctuation.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_hyphen = false;
    for c in text.nfkd().filter(char::is_ascii) {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c);
        } else if c.is_ascii_whitespace() || c == '-' || c == '_' {
            pending_hyphen = true;
        }
    }
    out
}

/// The first `max` characters of `s`, cut on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Date precision used for a slug candidate, in probing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `2024-03-01`
    Date,
    /// `2024-03-01T9.5.7` (unpadded hour, minute, second)
    DateSeconds,
    /// `2024-03-01T09.05.07`, with `.ffffff` microseconds when non-zero
    DateFullTime,
}

impl DateFormat {
    pub const PROBE_ORDER: [DateFormat; 3] =
        [DateFormat::Date, DateFormat::DateSeconds, DateFormat::DateFullTime];

    pub fn format(self, dt: &DateTime<Utc>) -> String {
        let date = format!("{:04}-{:02}-{:02}", dt.year(), dt.month(), dt.day());
        match self {
            Self::Date => date,
            Self::DateSeconds => format!(
                "{}T{}.{}.{}",
                date,
                dt.hour(),
                dt.minute(),
                dt.second()
            ),
            Self::DateFullTime => {
                let micros = (dt.nanosecond() % 1_000_000_000) / 1_000;
                let mut out = format!(
                    "{}T{:02}.{:02}.{:02}",
                    date,
                    dt.hour(),
                    dt.minute(),
                    dt.second()
                );
                if micros != 0 {
                    out.push_str(&format!(".{:06}", micros));
                }
                out
            }
        }
    }
}

/// The attributes of a new sample that feed its slug.
#[derive(Debug, Clone, Default)]
pub struct SlugSource<'a> {
    /// Primary key assigned before insert; the last-resort slug.
    pub id: Uuid,
    pub user: Option<&'a str>,
    pub name: Option<&'a str>,
    pub location_slug: Option<&'a str>,
    pub collected_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl<'a> SlugSource<'a> {
    /// Collection time, else creation time, else the clock.
    pub fn reference_instant(&self, clock: &dyn Clock) -> DateTime<Utc> {
        self.collected_at
            .or(self.created_at)
            .unwrap_or_else(|| clock.now())
    }

    /// The candidates in probing order, each already truncated.
    pub fn candidates(&self, clock: &dyn Clock, config: &SlugConfig) -> Vec<String> {
        let instant = self.reference_instant(clock);
        let user = self.user.unwrap_or_default();
        let location = truncate_chars(
            self.location_slug.unwrap_or_default(),
            config.location_prefix_len,
        );
        let hint = slugify(self.name.unwrap_or_default());

        DateFormat::PROBE_ORDER
            .iter()
            .map(|fmt| {
                let date = fmt.format(&instant);
                let joined = [user, date.as_str(), location, hint.as_str()]
                    .iter()
                    .filter(|part| !part.is_empty())
                    .copied()
                    .collect::<Vec<_>>()
                    .join(SLUG_SEPARATOR);
                truncate_chars(&joined, config.max_len).to_string()
            })
            .collect()
    }

    /// The slug used when every candidate is taken.
    pub fn fallback(&self) -> String {
        self.id.to_string()
    }
}

/// Pick the first unused slug for a new sample.
///
/// `is_taken` reports whether a slug already belongs to another sample; it is
/// always called with the truncated candidate.
pub fn generate_unique_slug<F>(
    source: &SlugSource<'_>,
    clock: &dyn Clock,
    config: &SlugConfig,
    mut is_taken: F,
) -> Result<String>
where
    F: FnMut(&str) -> Result<bool>,
{
    for candidate in source.candidates(clock, config) {
        if !is_taken(&candidate)? {
            debug!(
                subsystem = "catalog",
                component = "slug",
                op = "generate_slug",
                sample_id = %source.id,
                slug = %candidate,
                "Slug candidate accepted"
            );
            return Ok(candidate);
        }
        debug!(
            subsystem = "catalog",
            component = "slug",
            op = "generate_slug",
            sample_id = %source.id,
            candidate = %candidate,
            "Slug candidate taken"
        );
    }

    let fallback = source.fallback();
    if is_taken(&fallback)? {
        return Err(Error::SlugExhausted { fallback });
    }
    warn!(
        subsystem = "catalog",
        component = "slug",
        op = "generate_slug",
        sample_id = %source.id,
        slug = %fallback,
        "All slug candidates taken, falling back to sample id"
    );
    Ok(fallback)
}
