//! Tenant directory lookup
//!
//! The router never owns tenant records; it reads them through the
//! [`TenantDirectory`] seam. Two implementations are provided: a
//! Postgres-backed directory over the `tenant_registry` table and a
//! static in-memory directory for tests and fixed deployments.

use crate::error::{Result, RouterError};
use async_trait::async_trait;
use moka::future::Cache;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Duration;
use tenancy_models::TenantRecord;

/// Maps tenant identifiers to their configuration
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Look up a tenant by identifier. Fails with
    /// [`RouterError::UnknownTenant`] when no active record exists.
    async fn lookup(&self, identifier: &str) -> Result<TenantRecord>;
}

/// Configuration for the Postgres-backed directory's record cache
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub cache_capacity: u64,
    pub cache_ttl: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            cache_ttl: Duration::from_secs(60),
        }
    }
}

impl DirectoryConfig {
    pub fn from_env() -> Self {
        Self {
            cache_capacity: std::env::var("TENANT_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            cache_ttl: Duration::from_secs(
                std::env::var("TENANT_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}

/// Directory backed by the `tenant_registry` table
///
/// Positive lookups are cached; misses are not, so an unknown tenant
/// stays an immediate error rather than a cached one.
#[derive(Clone)]
pub struct PgTenantDirectory {
    pool: PgPool,
    cache: Cache<String, TenantRecord>,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool, config: DirectoryConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(config.cache_ttl)
            .build();

        Self { pool, cache }
    }

    async fn fetch(&self, identifier: &str) -> Result<TenantRecord> {
        let record = sqlx::query_as::<_, TenantRecord>(
            r#"
            SELECT id, identifier, name, "schema", status, created_at
            FROM tenant_registry
            WHERE identifier = $1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(RouterError::Connectivity)?
        .ok_or_else(|| RouterError::UnknownTenant(identifier.to_string()))?;

        if !record.is_active() {
            tracing::debug!(
                tenant = %identifier,
                status = %record.status,
                "refusing lookup for inactive tenant"
            );
            return Err(RouterError::UnknownTenant(identifier.to_string()));
        }

        Ok(record)
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn lookup(&self, identifier: &str) -> Result<TenantRecord> {
        if let Some(record) = self.cache.get(identifier).await {
            if record.is_active() {
                return Ok(record);
            }
            self.cache.invalidate(identifier).await;
        }

        let record = self.fetch(identifier).await?;
        self.cache
            .insert(identifier.to_string(), record.clone())
            .await;

        Ok(record)
    }
}

/// Fixed identifier-to-record map, for tests and config-driven setups
#[derive(Debug, Clone, Default)]
pub struct StaticTenantDirectory {
    tenants: HashMap<String, TenantRecord>,
}

impl StaticTenantDirectory {
    pub fn new(records: impl IntoIterator<Item = TenantRecord>) -> Self {
        Self {
            tenants: records
                .into_iter()
                .map(|r| (r.identifier.clone(), r))
                .collect(),
        }
    }
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
    async fn lookup(&self, identifier: &str) -> Result<TenantRecord> {
        self.tenants
            .get(identifier)
            .filter(|r| r.is_active())
            .cloned()
            .ok_or_else(|| RouterError::UnknownTenant(identifier.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookup_known_tenant() {
        let directory =
            StaticTenantDirectory::new([TenantRecord::new("tenantA", "sales")]);

        let record = directory.lookup("tenantA").await.unwrap();
        assert_eq!(record.schema, "sales");
    }

    #[tokio::test]
    async fn test_static_lookup_unknown_tenant() {
        let directory = StaticTenantDirectory::new([]);

        let err = directory.lookup("ghost").await.unwrap_err();
        assert!(matches!(err, RouterError::UnknownTenant(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_static_lookup_refuses_inactive_tenant() {
        let mut record = TenantRecord::new("tenantA", "sales");
        record.status = "suspended".to_string();
        let directory = StaticTenantDirectory::new([record]);

        let err = directory.lookup("tenantA").await.unwrap_err();
        assert!(matches!(err, RouterError::UnknownTenant(_)));
    }

    #[test]
    fn test_directory_config_defaults() {
        let config = DirectoryConfig::default();
        assert_eq!(config.cache_capacity, 1024);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
    }

    async fn live_directory() -> (PgPool, PgTenantDirectory) {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost:5432/tenancy".to_string());
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("Failed to connect to database");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tenant_registry (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                identifier TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                "schema" TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let directory = PgTenantDirectory::new(pool.clone(), DirectoryConfig::default());
        (pool, directory)
    }

    async fn reset_registry_row(pool: &PgPool, identifier: &str) {
        sqlx::query("DELETE FROM tenant_registry WHERE identifier = $1")
            .bind(identifier)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn insert_registry_row(pool: &PgPool, identifier: &str, schema: &str, status: &str) {
        sqlx::query(
            r#"
            INSERT INTO tenant_registry (identifier, name, "schema", status)
            VALUES ($1, $1, $2, $3)
            "#,
        )
        .bind(identifier)
        .bind(schema)
        .bind(status)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_pg_lookup_known_tenant() {
        let (pool, directory) = live_directory().await;
        reset_registry_row(&pool, "dir_known").await;
        insert_registry_row(&pool, "dir_known", "dir_known_schema", "active").await;

        let record = directory.lookup("dir_known").await.unwrap();
        assert_eq!(record.identifier, "dir_known");
        assert_eq!(record.schema, "dir_known_schema");
        assert!(record.is_active());
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_pg_lookup_miss_is_not_cached() {
        let (pool, directory) = live_directory().await;
        reset_registry_row(&pool, "dir_late").await;

        let err = directory.lookup("dir_late").await.unwrap_err();
        assert!(matches!(err, RouterError::UnknownTenant(_)));

        // The tenant appears after the miss; the very next lookup must
        // see it rather than a cached negative.
        insert_registry_row(&pool, "dir_late", "dir_late_schema", "active").await;

        let record = directory.lookup("dir_late").await.unwrap();
        assert_eq!(record.schema, "dir_late_schema");
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_pg_lookup_refuses_suspended_tenant() {
        let (pool, directory) = live_directory().await;
        reset_registry_row(&pool, "dir_suspended").await;
        insert_registry_row(&pool, "dir_suspended", "dir_suspended_schema", "suspended").await;

        let err = directory.lookup("dir_suspended").await.unwrap_err();
        assert!(matches!(err, RouterError::UnknownTenant(id) if id == "dir_suspended"));
    }
}
