//! Tag repository implementation.
//!
//! Each tag row carries a `target_kind` and exactly one of `location_id`,
//! `sample_id`, `parameter_id`. Inserting a tag moves the owner's
//! `updated_at_utc` to the tag's creation time in the same transaction.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use labtrack_core::{Error, Result, Tag, TagRepository, TagTarget, TargetKind};

use crate::errors::map_db_error;

/// PostgreSQL implementation of TagRepository.
#[derive(Clone)]
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    /// Create a new PgTagRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Owner table and the tag column referencing it.
fn owner_columns(kind: TargetKind) -> (&'static str, &'static str) {
    match kind {
        TargetKind::Location => ("location", "location_id"),
        TargetKind::Sample => ("sample", "sample_id"),
        TargetKind::Parameter => ("parameter", "parameter_id"),
    }
}

fn tag_from_row(row: &PgRow) -> Result<Tag> {
    let kind_str: String = row.get("target_kind");
    let kind: TargetKind = kind_str.parse().map_err(Error::Internal)?;
    let (_, column) = owner_columns(kind);
    let target_id: Option<Uuid> = row.get(column);
    let target_id = target_id.ok_or_else(|| {
        Error::Internal(format!("tag row of kind {} has no {}", kind, column))
    })?;

    Ok(Tag {
        id: row.get("id"),
        term_id: row.get("term_id"),
        term_slug: row.get("term_slug"),
        value: row.get("value"),
        target: TagTarget {
            kind,
            id: target_id,
        },
        created_at: row.get("created_at_utc"),
    })
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn insert_tag(&self, tag: &Tag) -> Result<()> {
        let (table, column) = owner_columns(tag.target.kind);
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(&format!(
            "INSERT INTO tag (id, term_id, value, target_kind, {}, created_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6)",
            column
        ))
        .bind(tag.id)
        .bind(tag.term_id)
        .bind(&tag.value)
        .bind(tag.target.kind.to_string())
        .bind(tag.target.id)
        .bind(tag.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let touched = sqlx::query(&format!(
            "UPDATE {} SET updated_at_utc = $2 WHERE id = $1",
            table
        ))
        .bind(tag.target.id)
        .bind(tag.created_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;
        if touched.rows_affected() == 0 {
            return Err(Error::NotFound(tag.target.to_string()));
        }

        tx.commit().await.map_err(Error::Database)?;
        debug!(
            subsystem = "database",
            component = "tags",
            op = "insert",
            tag_id = %tag.id,
            target = %tag.target,
            "Tag inserted and owner touched"
        );
        Ok(())
    }

    async fn list_tags(&self, target: TagTarget) -> Result<Vec<Tag>> {
        let (_, column) = owner_columns(target.kind);
        let rows = sqlx::query(&format!(
            "SELECT t.id, t.term_id, k.slug AS term_slug, t.value, t.target_kind,
                    t.location_id, t.sample_id, t.parameter_id, t.created_at_utc
             FROM tag t
             JOIN term k ON k.id = t.term_id
             WHERE t.{} = $1
             ORDER BY t.created_at_utc, t.id",
            column
        ))
        .bind(target.id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(tag_from_row).collect()
    }

    async fn delete_tag(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM tag WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("tag {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_columns_match_schema() {
        assert_eq!(owner_columns(TargetKind::Location), ("location", "location_id"));
        assert_eq!(owner_columns(TargetKind::Sample), ("sample", "sample_id"));
        assert_eq!(owner_columns(TargetKind::Parameter), ("parameter", "parameter_id"));
    }
}
