pub mod pool;

pub use pool::{connect, create_pool, run_migrations, Database, DatabaseError, DEFAULT_MIGRATIONS_PATH};
