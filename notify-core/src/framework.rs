use sqlx::PgPool;

/// Executes the SQL command structs in [`crate::entities`] through
/// `kanau::processor::Processor`.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
