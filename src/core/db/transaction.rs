/// Transaction Coordinator Module
///
/// Runs a unit of work inside a transaction and guarantees exactly one of
/// commit or rollback happens.

use rusqlite::TransactionBehavior;
use serde::Deserialize;
use tracing::{debug, warn};

use super::connection::{RootConnection, TxConnection};
use crate::core::Result;

/// How the transaction acquires its locks; mirrors SQLite's `BEGIN` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeginMode {
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

impl From<BeginMode> for TransactionBehavior {
    fn from(mode: BeginMode) -> Self {
        match mode {
            BeginMode::Deferred => TransactionBehavior::Deferred,
            BeginMode::Immediate => TransactionBehavior::Immediate,
            BeginMode::Exclusive => TransactionBehavior::Exclusive,
        }
    }
}

/// Begins a transaction on `conn`, hands it to `work` and settles it.
///
/// - `work` returns `Ok`: commit. A failed commit is returned as an `Other` error.
/// - `work` returns `Err`: rollback, then return that same error. A failed
///   rollback is logged, never reported over the original error.
/// - `work` panics: the transaction guard rolls back while unwinding and the
///   panic continues unchanged.
pub fn with_transaction<T, F>(conn: &mut RootConnection, mode: BeginMode, work: F) -> Result<T>
where
    F: FnOnce(&TxConnection<'_>) -> Result<T>,
{
    let tx = conn.begin(mode.into())?;

    match work(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            debug!("transaction work failed ({}), rolling back", err.kind());
            if let Err(rollback_err) = tx.rollback() {
                warn!("rollback after failed work also failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}
