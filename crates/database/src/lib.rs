pub mod connection;
pub mod directory;
pub mod error;
pub mod router;

pub use connection::{Database, DatabaseConfig};
pub use directory::{
    DirectoryConfig, PgTenantDirectory, StaticTenantDirectory, TenantDirectory,
};
pub use error::{Result, RouterError};
pub use router::{ConnectionProvider, RouterConfig, SchemaRouter, DEFAULT_SCHEMA};
