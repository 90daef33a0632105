//! Tenant-scoped connection router
//!
//! Sits between the connection pool and the session layer. For each
//! checkout it resolves the tenant's schema through the directory and
//! switches the borrowed connection's `search_path` to it; on release
//! the `search_path` is reset to the default schema before the handle
//! goes back to the pool, so a reused connection can never expose a
//! stale tenant's schema to the next borrower.

use crate::directory::TenantDirectory;
use crate::error::{Result, RouterError};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, PgPool, Postgres};
use std::sync::Arc;

/// Schema every connection is reset to before re-entering the pool
pub const DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub default_schema: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

impl RouterConfig {
    pub fn from_env() -> Self {
        Self {
            default_schema: std::env::var("DEFAULT_SCHEMA")
                .unwrap_or_else(|_| DEFAULT_SCHEMA.to_string()),
        }
    }
}

/// Contract a session layer uses for tenant-aware connection checkout
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Borrow a connection scoped to the default schema, for
    /// tenant-agnostic work such as migrations or introspection.
    async fn acquire_any(&self) -> Result<PoolConnection<Postgres>>;

    /// Borrow a connection scoped to the given tenant's schema.
    async fn acquire(&self, tenant: &str) -> Result<PoolConnection<Postgres>>;

    /// Return a default-scoped connection to the pool unchanged.
    async fn release_any(&self, conn: PoolConnection<Postgres>) -> Result<()>;

    /// Reset the connection to the default schema, then return it to
    /// the pool. The reset runs on every exit path.
    async fn release(&self, tenant: &str, conn: PoolConnection<Postgres>) -> Result<()>;

    /// Whether connections may be released and re-acquired
    /// mid-transaction without breaking transactional semantics.
    fn supports_aggressive_release(&self) -> bool;
}

/// Routes pooled connections to per-tenant schemas
///
/// Holds no mutable state; concurrent calls each operate on their own
/// borrowed connection. Pool and directory are assumed thread-safe.
#[derive(Clone)]
pub struct SchemaRouter {
    pool: PgPool,
    directory: Arc<dyn TenantDirectory>,
    config: RouterConfig,
}

impl SchemaRouter {
    pub fn new(pool: PgPool, directory: Arc<dyn TenantDirectory>, config: RouterConfig) -> Self {
        tracing::info!(default_schema = %config.default_schema, "schema router initialized");
        Self {
            pool,
            directory,
            config,
        }
    }

    pub fn default_schema(&self) -> &str {
        &self.config.default_schema
    }

    async fn borrow(&self) -> Result<PoolConnection<Postgres>> {
        self.pool.acquire().await.map_err(RouterError::Connectivity)
    }

    async fn switch_schema(conn: &mut PoolConnection<Postgres>, schema: &str) -> Result<()> {
        let ident = quote_ident(schema)?;
        sqlx::query(&format!("SET search_path TO {ident}"))
            .execute(&mut **conn)
            .await
            .map_err(|source| RouterError::SchemaSwitch {
                schema: schema.to_string(),
                source,
            })?;
        Ok(())
    }
}

#[async_trait]
impl ConnectionProvider for SchemaRouter {
    async fn acquire_any(&self) -> Result<PoolConnection<Postgres>> {
        let mut conn = self.borrow().await?;
        Self::switch_schema(&mut conn, &self.config.default_schema).await?;
        Ok(conn)
    }

    async fn acquire(&self, tenant: &str) -> Result<PoolConnection<Postgres>> {
        // Lookup before borrowing: an unknown tenant must never touch the pool.
        let record = self.directory.lookup(tenant).await?;

        let mut conn = self.borrow().await?;
        // A failed switch leaves the connection at the default schema,
        // so dropping it back to the pool here is safe.
        Self::switch_schema(&mut conn, &record.schema).await?;

        tracing::debug!(tenant = %tenant, schema = %record.schema, "scoped connection checked out");
        Ok(conn)
    }

    async fn release_any(&self, conn: PoolConnection<Postgres>) -> Result<()> {
        drop(conn);
        Ok(())
    }

    async fn release(&self, tenant: &str, mut conn: PoolConnection<Postgres>) -> Result<()> {
        // No directory lookup here: the reset writes the configured
        // default directly, even if the tenant has since disappeared.
        if let Err(err) = Self::switch_schema(&mut conn, &self.config.default_schema).await {
            // A handle whose schema could not be reset must not re-enter
            // the pool.
            tracing::warn!(tenant = %tenant, error = %err, "schema reset failed, discarding connection");
            conn.detach().close().await.ok();
            return Err(err);
        }

        tracing::debug!(tenant = %tenant, "scoped connection released");
        drop(conn);
        Ok(())
    }

    fn supports_aggressive_release(&self) -> bool {
        // Schema switching is stateless per checkout.
        true
    }
}

fn quote_ident(ident: &str) -> Result<String> {
    if ident.is_empty()
        || !ident
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(RouterError::InvalidSchema(ident.to_string()));
    }
    Ok(format!("\"{ident}\""))
}
