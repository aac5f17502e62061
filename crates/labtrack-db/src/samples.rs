//! Sample repository implementation.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use labtrack_core::{Error, Result, Sample, SampleRepository};

use crate::errors::map_db_error;

const SAMPLE_COLUMNS: &str = "id, name, slug, parent_id, collected_at_utc, location_id, \
                              created_by, created_at_utc, updated_at_utc";

/// PostgreSQL implementation of SampleRepository.
#[derive(Clone)]
pub struct PgSampleRepository {
    pool: Pool<Postgres>,
}

impl PgSampleRepository {
    /// Create a new PgSampleRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn sample_from_row(row: &PgRow) -> Sample {
    Sample {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        parent_id: row.get("parent_id"),
        collected_at: row.get("collected_at_utc"),
        location_id: row.get("location_id"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at_utc"),
        updated_at: row.get("updated_at_utc"),
    }
}

#[async_trait]
impl SampleRepository for PgSampleRepository {
    async fn insert_sample(&self, sample: &Sample) -> Result<()> {
        sqlx::query(
            "INSERT INTO sample (id, name, slug, parent_id, collected_at_utc, location_id,
                                 created_by, created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(sample.id)
        .bind(&sample.name)
        .bind(&sample.slug)
        .bind(sample.parent_id)
        .bind(sample.collected_at)
        .bind(sample.location_id)
        .bind(&sample.created_by)
        .bind(sample.created_at)
        .bind(sample.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get_sample(&self, id: Uuid) -> Result<Option<Sample>> {
        let row = sqlx::query(&format!("SELECT {} FROM sample WHERE id = $1", SAMPLE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(sample_from_row))
    }

    async fn get_sample_by_slug(&self, slug: &str) -> Result<Option<Sample>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM sample WHERE slug = $1",
            SAMPLE_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(sample_from_row))
    }

    async fn list_samples(&self, parent_id: Option<Uuid>) -> Result<Vec<Sample>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sample WHERE parent_id IS NOT DISTINCT FROM $1
             ORDER BY created_at_utc, slug",
            SAMPLE_COLUMNS
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(sample_from_row).collect())
    }

    async fn existing_sample_slugs(&self, slugs: &[String]) -> Result<HashSet<String>> {
        if slugs.is_empty() {
            return Ok(HashSet::new());
        }
        let taken: Vec<String> = sqlx::query_scalar("SELECT slug FROM sample WHERE slug = ANY($1)")
            .bind(slugs)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        debug!(
            subsystem = "database",
            component = "samples",
            op = "existing_slugs",
            probed = slugs.len(),
            taken = taken.len(),
            "Probed sample slugs"
        );
        Ok(taken.into_iter().collect())
    }

    async fn count_samples_with_slug(&self, slug: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sample WHERE slug = $1")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }

    async fn update_sample_name(&self, id: Uuid, name: &str, at: DateTime<Utc>) -> Result<()> {
        let result =
            sqlx::query("UPDATE sample SET name = $2, updated_at_utc = $3 WHERE id = $1")
                .bind(id)
                .bind(name)
                .bind(at)
                .execute(&self.pool)
                .await
                .map_err(map_db_error)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("sample {}", id)));
        }
        Ok(())
    }

    async fn delete_sample(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM sample WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("sample {}", id)));
        }
        Ok(())
    }
}
