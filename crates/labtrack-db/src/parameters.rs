//! Parameter repository implementation.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use labtrack_core::{Error, Parameter, ParameterRepository, Result};

use crate::errors::map_db_error;

const PARAMETER_COLUMNS: &str = "id, name, slug, parent_id, description, validators, created_by, \
                                 created_at_utc, updated_at_utc";

/// PostgreSQL implementation of ParameterRepository.
#[derive(Clone)]
pub struct PgParameterRepository {
    pool: Pool<Postgres>,
}

impl PgParameterRepository {
    /// Create a new PgParameterRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn parameter_from_row(row: &PgRow) -> Parameter {
    Parameter {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        parent_id: row.get("parent_id"),
        description: row.get("description"),
        validators: row.get("validators"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at_utc"),
        updated_at: row.get("updated_at_utc"),
    }
}

#[async_trait]
impl ParameterRepository for PgParameterRepository {
    async fn insert_parameter(&self, parameter: &Parameter) -> Result<()> {
        sqlx::query(
            "INSERT INTO parameter (id, name, slug, parent_id, description, validators, created_by,
                                    created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(parameter.id)
        .bind(&parameter.name)
        .bind(&parameter.slug)
        .bind(parameter.parent_id)
        .bind(&parameter.description)
        .bind(&parameter.validators)
        .bind(&parameter.created_by)
        .bind(parameter.created_at)
        .bind(parameter.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get_parameter(&self, id: Uuid) -> Result<Option<Parameter>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM parameter WHERE id = $1",
            PARAMETER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(parameter_from_row))
    }

    async fn get_parameter_by_slug(&self, slug: &str) -> Result<Option<Parameter>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM parameter WHERE slug = $1",
            PARAMETER_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(parameter_from_row))
    }

    async fn list_parameters(&self, parent_id: Option<Uuid>) -> Result<Vec<Parameter>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM parameter WHERE parent_id IS NOT DISTINCT FROM $1 ORDER BY name",
            PARAMETER_COLUMNS
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(parameter_from_row).collect())
    }

    async fn parameter_name_exists(&self, name: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM parameter WHERE name = $1)")
                .bind(name)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(exists)
    }

    async fn parameter_slug_exists(&self, slug: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM parameter WHERE slug = $1)")
                .bind(slug)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(exists)
    }

    async fn delete_parameter(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM parameter WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("parameter {}", id)));
        }
        Ok(())
    }
}
