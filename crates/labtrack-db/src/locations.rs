//! Location repository implementation.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use labtrack_core::{Error, Location, LocationRepository, Result};

use crate::errors::map_db_error;

const LOCATION_COLUMNS: &str = "id, name, slug, parent_id, description, geometry, created_by, \
                                created_at_utc, updated_at_utc";

/// PostgreSQL implementation of LocationRepository.
#[derive(Clone)]
pub struct PgLocationRepository {
    pool: Pool<Postgres>,
}

impl PgLocationRepository {
    /// Create a new PgLocationRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn location_from_row(row: &PgRow) -> Location {
    Location {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        parent_id: row.get("parent_id"),
        description: row.get("description"),
        geometry: row.get("geometry"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at_utc"),
        updated_at: row.get("updated_at_utc"),
    }
}

#[async_trait]
impl LocationRepository for PgLocationRepository {
    async fn insert_location(&self, location: &Location) -> Result<()> {
        sqlx::query(
            "INSERT INTO location (id, name, slug, parent_id, description, geometry, created_by,
                                   created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(location.id)
        .bind(&location.name)
        .bind(&location.slug)
        .bind(location.parent_id)
        .bind(&location.description)
        .bind(&location.geometry)
        .bind(&location.created_by)
        .bind(location.created_at)
        .bind(location.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get_location(&self, id: Uuid) -> Result<Option<Location>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM location WHERE id = $1",
            LOCATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(location_from_row))
    }

    async fn get_location_by_slug(&self, slug: &str) -> Result<Option<Location>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM location WHERE slug = $1",
            LOCATION_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(location_from_row))
    }

    async fn list_locations(&self, parent_id: Option<Uuid>) -> Result<Vec<Location>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM location WHERE parent_id IS NOT DISTINCT FROM $1 ORDER BY name",
            LOCATION_COLUMNS
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(location_from_row).collect())
    }

    async fn location_name_exists(&self, name: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM location WHERE name = $1)")
                .bind(name)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(exists)
    }

    async fn location_slug_exists(&self, slug: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM location WHERE slug = $1)")
                .bind(slug)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(exists)
    }

    async fn delete_location(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM location WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("location {}", id)));
        }
        Ok(())
    }
}
