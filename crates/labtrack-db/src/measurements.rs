//! Measurement repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use labtrack_core::{Error, Measurement, MeasurementRepository, Result};

use crate::errors::map_db_error;

const MEASUREMENT_COLUMNS: &str =
    "id, sample_id, parameter_id, value, tags, created_by, created_at_utc, updated_at_utc";

/// PostgreSQL implementation of MeasurementRepository.
#[derive(Clone)]
pub struct PgMeasurementRepository {
    pool: Pool<Postgres>,
}

impl PgMeasurementRepository {
    /// Create a new PgMeasurementRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn measurement_from_row(row: &PgRow) -> Measurement {
    Measurement {
        id: row.get("id"),
        sample_id: row.get("sample_id"),
        parameter_id: row.get("parameter_id"),
        value: row.get("value"),
        tags: row.get("tags"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at_utc"),
        updated_at: row.get("updated_at_utc"),
    }
}

#[async_trait]
impl MeasurementRepository for PgMeasurementRepository {
    async fn insert_measurement(&self, measurement: &Measurement) -> Result<()> {
        sqlx::query(
            "INSERT INTO measurement (id, sample_id, parameter_id, value, tags, created_by,
                                      created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(measurement.id)
        .bind(measurement.sample_id)
        .bind(measurement.parameter_id)
        .bind(&measurement.value)
        .bind(&measurement.tags)
        .bind(&measurement.created_by)
        .bind(measurement.created_at)
        .bind(measurement.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get_measurement(&self, id: Uuid) -> Result<Option<Measurement>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM measurement WHERE id = $1",
            MEASUREMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(measurement_from_row))
    }

    async fn list_measurements_for_sample(&self, sample_id: Uuid) -> Result<Vec<Measurement>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM measurement WHERE sample_id = $1 ORDER BY created_at_utc, id",
            MEASUREMENT_COLUMNS
        ))
        .bind(sample_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(measurement_from_row).collect())
    }

    async fn update_measurement_tags(
        &self,
        id: Uuid,
        tags: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE measurement SET tags = $2, updated_at_utc = $3 WHERE id = $1")
                .bind(id)
                .bind(tags)
                .bind(at)
                .execute(&self.pool)
                .await
                .map_err(map_db_error)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("measurement {}", id)));
        }
        Ok(())
    }

    async fn delete_measurement(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM measurement WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("measurement {}", id)));
        }
        Ok(())
    }
}
