//! Transactional unit of work.

use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Run `work` inside one `BEGIN IMMEDIATE` transaction.
///
/// Commits exactly once when `work` succeeds. Any error rolls the
/// transaction back and is handed back to the caller untouched. A panic in
/// `work` drops the transaction, which rolls it back as well.
pub fn run_in_transaction<T, E, F>(conn: &mut Connection, work: F) -> Result<T, E>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    E: From<rusqlite::Error>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    match work(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            roll_back(tx);
            Err(err)
        }
    }
}

/// Like [`run_in_transaction`] but never commits. Used for dry runs, which
/// must see exactly the state a real run would see.
pub fn run_then_roll_back<T, E, F>(conn: &mut Connection, work: F) -> Result<T, E>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    E: From<rusqlite::Error>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let outcome = work(&tx);
    roll_back(tx);
    outcome
}

fn roll_back(tx: Transaction<'_>) {
    if let Err(err) = tx.rollback() {
        // The connection closes the transaction itself when this fails.
        tracing::warn!(error = %err, "rollback failed");
    } else {
        tracing::debug!("transaction rolled back");
    }
}
