//! The ledger engine: request lifecycles, commission distribution and the
//! primitives that move money between wallets, held balances and the
//! transaction log.
//!
//! Every mutating operation runs as one [`UnitOfWork`] under a single lock, so
//! requests are serialized and a transition either commits completely or not
//! at all.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::state::LedgerState;
use crate::db::store::{LedgerStore, StoreError};

pub mod account;
pub mod catalog;
pub mod commission;
pub mod deposit;
pub mod error;
pub mod notify;
pub mod purchase;
pub mod reports;
pub mod transfer;
pub mod unit;
pub mod withdrawal;

#[cfg(test)]
pub mod testing;

use error::LedgerResult;
use notify::NotificationSink;
use unit::UnitOfWork;

pub struct Ledger {
    state: Mutex<LedgerState>,
    store: Arc<dyn LedgerStore>,
    sink: Arc<dyn NotificationSink>,
}

impl Ledger {
    pub fn new(state: LedgerState, store: Arc<dyn LedgerStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            state: Mutex::new(state),
            store,
            sink,
        }
    }

    /// Loads the persisted document, or starts from an empty ledger.
    pub async fn open(store: Arc<dyn LedgerStore>, sink: Arc<dyn NotificationSink>) -> Result<Self, StoreError> {
        let state = match store.load().await? {
            Some(state) => {
                tracing::info!(
                    users = state.users.len(),
                    transactions = state.transactions.len(),
                    "Ledger document loaded"
                );
                state
            }
            None => {
                tracing::info!("No ledger document found, starting empty");
                LedgerState::default()
            }
        };
        Ok(Self::new(state, store, sink))
    }

    /// Runs `op` against a staged copy of the ledger. The copy is persisted and
    /// swapped in only if `op` succeeds; queued notifications are delivered
    /// after the commit.
    ///
    /// Each call clones and saves the whole document, and the transaction and
    /// notification logs only grow, so a commit costs O(ledger size).
    pub async fn transact<T, F>(&self, op: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut UnitOfWork) -> LedgerResult<T>,
    {
        let mut guard = self.state.lock().await;
        let mut work = UnitOfWork::new(guard.clone());
        let output = op(&mut work)?;

        let (next, outbox) = work.into_parts();
        if let Err(err) = self.store.save(&next).await {
            tracing::error!("Failed to persist ledger: {err}");
            return Err(err.into());
        }
        *guard = next;
        drop(guard);

        for notification in &outbox {
            self.sink.notify(notification);
        }
        Ok(output)
    }

    pub async fn read<T>(&self, op: impl FnOnce(&LedgerState) -> T) -> T {
        let guard = self.state.lock().await;
        op(&guard)
    }
}
