//! Scoped unit of work over the connection pool.
//!
//! Every store operation that issues more than one statement, or any write,
//! runs inside a [`TxScope`]. The scope is resolved exactly once by
//! [`TxScope::finish`]: commit when the body returned `Ok`, rollback
//! otherwise. A rollback failure is logged and the body's error is returned
//! unchanged. A scope dropped without `finish` rolls back through sqlx's own
//! drop handling.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::warn;

use crate::error::StoreError;

/// An open transaction tagged with the operation it serves.
pub struct TxScope {
    tx: Transaction<'static, Postgres>,
    op: &'static str,
}

impl TxScope {
    /// Begin a transaction on a pooled connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transaction`] if no connection can be acquired
    /// or `BEGIN` fails.
    pub async fn begin(pool: &PgPool, op: &'static str) -> Result<Self, StoreError> {
        let tx = pool.begin().await.map_err(|e| StoreError::Transaction {
            op,
            reason: e.to_string(),
        })?;
        Ok(Self { tx, op })
    }

    /// The connection to run statements on.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Resolve the scope according to `result` and hand it back.
    ///
    /// # Errors
    ///
    /// Returns the body's own error after rolling back, or
    /// [`StoreError::Transaction`] if the commit of a successful body fails.
    pub async fn finish<T>(self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        let op = self.op;
        match result {
            Ok(value) => {
                self.tx.commit().await.map_err(|e| StoreError::Transaction {
                    op,
                    reason: e.to_string(),
                })?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.tx.rollback().await {
                    warn!(op, error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for TxScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxScope")
            .field("op", &self.op)
            .finish_non_exhaustive()
    }
}
