//! Term repository implementation.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use labtrack_core::{Error, Result, Term, TermRepository};

use crate::errors::map_db_error;

const TERM_COLUMNS: &str =
    "id, name, slug, description, validators, created_by, created_at_utc, updated_at_utc";

/// PostgreSQL implementation of TermRepository.
#[derive(Clone)]
pub struct PgTermRepository {
    pool: Pool<Postgres>,
}

impl PgTermRepository {
    /// Create a new PgTermRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn term_from_row(row: &PgRow) -> Term {
    Term {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        validators: row.get("validators"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at_utc"),
        updated_at: row.get("updated_at_utc"),
    }
}

#[async_trait]
impl TermRepository for PgTermRepository {
    async fn insert_term(&self, term: &Term) -> Result<()> {
        sqlx::query(
            "INSERT INTO term (id, name, slug, description, validators, created_by,
                               created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(term.id)
        .bind(&term.name)
        .bind(&term.slug)
        .bind(&term.description)
        .bind(&term.validators)
        .bind(&term.created_by)
        .bind(term.created_at)
        .bind(term.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get_term(&self, id: Uuid) -> Result<Option<Term>> {
        let row = sqlx::query(&format!("SELECT {} FROM term WHERE id = $1", TERM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(term_from_row))
    }

    async fn get_term_by_slug(&self, slug: &str) -> Result<Option<Term>> {
        let row = sqlx::query(&format!("SELECT {} FROM term WHERE slug = $1", TERM_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(term_from_row))
    }

    async fn list_terms(&self) -> Result<Vec<Term>> {
        let rows = sqlx::query(&format!("SELECT {} FROM term ORDER BY name", TERM_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(term_from_row).collect())
    }

    async fn term_name_exists(&self, name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM term WHERE name = $1)")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(exists)
    }

    async fn term_slug_exists(&self, slug: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM term WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(exists)
    }

    async fn delete_term(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM term WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("term {}", id)));
        }
        Ok(())
    }
}
