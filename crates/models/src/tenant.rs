use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Tenant registration record from the tenant directory
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: Uuid,
    /// Opaque identifier callers use to name the tenant
    pub identifier: String,
    pub name: String,
    /// Database schema holding this tenant's tables
    pub schema: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TenantRecord {
    /// Build an active record, mainly for static directories and tests
    pub fn new(identifier: impl Into<String>, schema: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            id: Uuid::new_v4(),
            name: identifier.clone(),
            identifier,
            schema: schema.into(),
            status: "active".to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}
