//! Schema bootstrap.
//!
//! Migrations are an ordered list compiled into the binary. Applied versions
//! are recorded in `schema_migrations`. A transaction-scoped advisory lock
//! serializes concurrent starters, so running [`migrate`] from several
//! processes at once applies each version exactly once.

use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::transaction::TxScope;

/// Advisory lock key shared by every process running migrations.
const MIGRATION_LOCK_KEY: i64 = 0x0064_6f63_7961_7264;

/// One schema change.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub sql: &'static [&'static str],
}

/// Every migration, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "account table",
        sql: &[r"CREATE TABLE IF NOT EXISTS account (
                id SERIAL PRIMARY KEY,
                username VARCHAR(255) NOT NULL UNIQUE CHECK (char_length(username) >= 4),
                password VARCHAR(255) NOT NULL CHECK (char_length(password) >= 4),
                is_admin BOOLEAN NOT NULL DEFAULT FALSE
            )"],
    },
    Migration {
        version: 2,
        description: "project table",
        sql: &[
            r"CREATE TABLE IF NOT EXISTS project (
                id SERIAL PRIMARY KEY,
                title VARCHAR(255) NOT NULL UNIQUE CHECK (char_length(title) >= 1),
                last_update TIMESTAMPTZ NOT NULL DEFAULT now(),
                account_id INT NOT NULL REFERENCES account (id)
                    ON UPDATE CASCADE ON DELETE CASCADE
            )",
            r"CREATE INDEX IF NOT EXISTS project_account_id_idx ON project (account_id)",
        ],
    },
];

/// Apply every migration not yet recorded. Returns how many were applied.
///
/// # Errors
///
/// Returns a [`StoreError`] if a statement fails; the whole run is rolled
/// back in that case.
pub async fn migrate(pool: &PgPool) -> Result<usize, StoreError> {
    let mut scope = TxScope::begin(pool, "migrate").await?;
    let result = apply_pending(&mut scope).await;
    let applied = scope.finish(result).await?;

    if applied == 0 {
        debug!("schema up to date");
    } else {
        info!(applied, "schema migrated");
    }
    Ok(applied)
}

async fn apply_pending(scope: &mut TxScope) -> Result<usize, StoreError> {
    let fail = |e| StoreError::from_sqlx("migrate", "schema_migrations", e);

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(scope.conn())
        .await
        .map_err(fail)?;

    sqlx::query(
        r"CREATE TABLE IF NOT EXISTS schema_migrations (
            version INT PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(scope.conn())
    .await
    .map_err(fail)?;

    let applied: Vec<i32> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(scope.conn())
        .await
        .map_err(fail)?;

    let mut count = 0;
    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        for statement in migration.sql {
            sqlx::query(*statement)
                .execute(scope.conn())
                .await
                .map_err(fail)?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(scope.conn())
            .await
            .map_err(fail)?;

        info!(
            version = migration.version,
            description = migration.description,
            "migration applied"
        );
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_strictly_increasing() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
        assert_eq!(MIGRATIONS.first().map(|m| m.version), Some(1));
    }

    #[test]
    fn every_migration_has_statements() {
        assert!(MIGRATIONS.iter().all(|m| !m.sql.is_empty()));
    }
}
