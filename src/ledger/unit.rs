//! Staged changes for one lifecycle transition.
//!
//! A `UnitOfWork` owns a copy of the ledger document. Every money movement is
//! expressed through the primitives below; the copy replaces the live state
//! only when the whole transition returned `Ok`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::admin::{Notification, Settings};
use crate::db::state::{LedgerState, Sequences};
use crate::db::tx::{NewTransaction, Transaction, TransactionType};
use crate::db::user::{User, UserId};

use super::error::{LedgerError, LedgerResult};

pub struct UnitOfWork {
    state: LedgerState,
    outbox: Vec<Notification>,
    now: DateTime<Utc>,
}

impl UnitOfWork {
    pub fn new(state: LedgerState) -> Self {
        Self {
            state,
            outbox: Vec::new(),
            now: Utc::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut LedgerState {
        &mut self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn money(&self, amount: Decimal) -> String {
        self.state.settings.money(amount)
    }

    pub fn user(&self, id: UserId) -> LedgerResult<&User> {
        self.state.user(id).ok_or_else(|| LedgerError::not_found("User", id))
    }

    pub fn user_mut(&mut self, id: UserId) -> LedgerResult<&mut User> {
        self.state
            .users
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("User", id))
    }

    /// Fails with `InsufficientFunds` unless the wallet covers `amount`.
    pub fn ensure_funds(&self, id: UserId, amount: Decimal) -> LedgerResult<()> {
        let available = self.user(id)?.wallet_balance;
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                available,
                required: amount,
            });
        }
        Ok(())
    }

    pub fn credit_wallet(&mut self, id: UserId, amount: Decimal) -> LedgerResult<Decimal> {
        let user = self.user_mut(id)?;
        user.wallet_balance += amount;
        Ok(user.wallet_balance)
    }

    // No sufficiency check here, callers run `ensure_funds` first.
    pub fn debit_wallet(&mut self, id: UserId, amount: Decimal) -> LedgerResult<Decimal> {
        let user = self.user_mut(id)?;
        user.wallet_balance -= amount;
        Ok(user.wallet_balance)
    }

    pub fn credit_held(&mut self, id: UserId, amount: Decimal) -> LedgerResult<Decimal> {
        let user = self.user_mut(id)?;
        user.held_balance += amount;
        Ok(user.held_balance)
    }

    pub fn debit_held(&mut self, id: UserId, amount: Decimal) -> LedgerResult<Decimal> {
        let user = self.user_mut(id)?;
        user.held_balance -= amount;
        Ok(user.held_balance)
    }

    pub fn record_transaction(&mut self, entry: NewTransaction) -> LedgerResult<Uuid> {
        let user_name = self.user(entry.user_id)?.username.clone();
        let id = Uuid::new_v4();
        self.state.transactions.push(Transaction {
            id,
            user_id: entry.user_id,
            user_name,
            transaction_type: entry.transaction_type,
            amount: entry.amount,
            status: entry.status,
            description: entry.description,
            level: entry.level,
            related_entity_id: entry.related_entity_id,
            source_user_id: entry.source_user_id,
            created_at: self.now,
            updated_at: self.now,
        });
        Ok(id)
    }

    /// Rewrites the latest entry of `kind` recorded for the given request id.
    /// Returns false when no such entry exists.
    pub fn update_related_transaction(
        &mut self,
        entity_id: &str,
        kind: TransactionType,
        update: impl FnOnce(&mut Transaction),
    ) -> bool {
        let now = self.now;
        let found = self.state.transactions.iter_mut().rev().find(|tx| {
            tx.transaction_type == kind && tx.related_entity_id.as_deref() == Some(entity_id)
        });
        match found {
            Some(tx) => {
                update(tx);
                tx.updated_at = now;
                true
            }
            None => false,
        }
    }

    /// Queues a notification. It becomes visible, and is delivered, only if
    /// the unit of work commits.
    pub fn notify(&mut self, user_id: UserId, message: impl Into<String>) {
        let notification = Notification {
            id: Sequences::next(&mut self.state.sequences.notification),
            user_id,
            message: message.into(),
            read: false,
            created_at: self.now,
        };
        self.state.notifications.push(notification.clone());
        self.outbox.push(notification);
    }

    pub fn into_parts(self) -> (LedgerState, Vec<Notification>) {
        (self.state, self.outbox)
    }
}
