//! Postgres-backed collaborators: import status, site ownership,
//! subscription tiers and queue offsets.

pub mod config;
pub mod offsets;
pub mod pool;
pub mod sites;
pub mod status;
pub mod subscriptions;

pub use config::PostgresConfig;
pub use offsets::PgOffsetStore;
pub use pool::{check_connection, connect, run_migrations};
pub use sites::PgSiteDirectory;
pub use status::PgStatusStore;
pub use subscriptions::PgSubscriptionSource;
pub use sqlx::PgPool;
