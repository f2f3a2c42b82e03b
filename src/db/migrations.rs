use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

// Path is relative to the crate root
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn run_sqlite_migrations(conn: &mut diesel::sqlite::SqliteConnection) -> anyhow::Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    if !applied.is_empty() {
        tracing::info!(count = applied.len(), "applied database migrations");
    }
    Ok(())
}
