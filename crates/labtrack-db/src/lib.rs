//! # labtrack-db
//!
//! PostgreSQL persistence layer for labtrack.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for every labtrack record
//! - [`Database`], which aggregates the repositories and implements
//!   [`labtrack_core::RecordStore`] so a [`Catalog`] can run on it
//!
//! ## Example
//!
//! ```rust,ignore
//! use labtrack_db::{Database, NewSample};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/labtrack").await?;
//!     let catalog = db.catalog();
//!
//!     let sample = catalog.create_sample(NewSample {
//!         name: Some("Soil Core A".to_string()),
//!         created_by: Some("jdoe".to_string()),
//!         ..Default::default()
//!     }).await?;
//!
//!     println!("Created sample: {}", sample);
//!     Ok(())
//! }
//! ```

mod errors;
pub mod locations;
pub mod measurements;
pub mod parameters;
pub mod pool;
mod store;
pub mod samples;
pub mod tags;
pub mod terms;
pub mod test_fixtures;

use std::sync::Arc;

pub use labtrack_core::*;

pub use locations::PgLocationRepository;
pub use measurements::PgMeasurementRepository;
pub use parameters::PgParameterRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use samples::PgSampleRepository;
pub use tags::PgTagRepository;
pub use terms::PgTermRepository;

/// Database connection and repository access.
#[derive(Clone)]
pub struct Database {
    pool: sqlx::Pool<sqlx::Postgres>,
    /// Vocabulary terms.
    pub terms: PgTermRepository,
    /// Location tree.
    pub locations: PgLocationRepository,
    /// Samples.
    pub samples: PgSampleRepository,
    /// Parameter tree.
    pub parameters: PgParameterRepository,
    /// Measurements.
    pub measurements: PgMeasurementRepository,
    /// Tags on locations, samples, and parameters.
    pub tags: PgTagRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            terms: PgTermRepository::new(pool.clone()),
            locations: PgLocationRepository::new(pool.clone()),
            samples: PgSampleRepository::new(pool.clone()),
            parameters: PgParameterRepository::new(pool.clone()),
            measurements: PgMeasurementRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Connect using `DATABASE_URL` and the pool size from the application config.
    pub async fn connect_from_config(config: &LabConfig) -> Result<Self> {
        let url = config.require_database_url()?;
        Self::connect_with_config(url, PoolConfig::from_lab_config(config)).await
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// A write-path catalog over this database on the system clock.
    pub fn catalog(&self) -> Catalog<Database> {
        Catalog::new(self.clone())
    }

    /// A catalog with explicit clock, validators, and config.
    pub fn catalog_with(
        &self,
        clock: Arc<dyn Clock>,
        validators: ValidatorRegistry,
        config: LabConfig,
    ) -> Catalog<Database> {
        Catalog::with_parts(self.clone(), clock, validators, config)
    }
}
