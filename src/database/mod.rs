//! Database pool management and migrations.

mod pool;

pub use pool::{create_pool, run_migrations, Database, DatabaseError};
