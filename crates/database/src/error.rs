use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Debug, Error)]
pub enum RouterError {
    /// The tenant directory has no record for the given identifier
    #[error("Unknown tenant: {0}")]
    UnknownTenant(String),

    /// Pool exhaustion, connection refused, or driver I/O failure
    #[error("Database connectivity error: {0}")]
    Connectivity(#[source] sqlx::Error),

    /// The driver rejected a search_path change
    #[error("Schema switch to '{schema}' rejected: {source}")]
    SchemaSwitch {
        schema: String,
        #[source]
        source: sqlx::Error,
    },

    /// Schema name failed identifier validation before reaching the driver
    #[error("Invalid schema name: '{0}'")]
    InvalidSchema(String),
}

impl RouterError {
    /// Connectivity failures may succeed on retry at a higher level;
    /// the other variants are caller or configuration defects.
    ///
    /// This layer never retries; callers decide based on the variant:
    ///
    /// ```
    /// use tenancy_database::RouterError;
    ///
    /// fn should_requeue(err: &RouterError) -> bool {
    ///     // Reject unknown tenants outright, requeue pool hiccups.
    ///     err.is_transient()
    /// }
    ///
    /// assert!(should_requeue(&RouterError::Connectivity(sqlx::Error::PoolTimedOut)));
    /// assert!(!should_requeue(&RouterError::UnknownTenant("ghost".into())));
    /// ```
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}
