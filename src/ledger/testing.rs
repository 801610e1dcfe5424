//! Fixtures shared by the ledger tests.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::db::admin::{MethodKind, MethodStatus, PaymentMethodInput};
use crate::db::plan::{
    AutoUpgrade, Commission, CommissionDeductions, HoldPosition, PlanId, PlanInput, PlanStatus,
};
use crate::db::state::{LedgerState, Sequences};
use crate::db::store::MemoryStore;
use crate::db::tx::TransactionType;
use crate::db::user::{User, UserId, UserStatus};

use super::notify::BroadcastSink;
use super::unit::UnitOfWork;
use super::Ledger;

pub fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}

pub fn pct(value: i64) -> Commission {
    Commission::percentage(dec(value))
}

pub fn plan(name: &str, price: i64) -> PlanInput {
    PlanInput {
        name: name.to_string(),
        price: dec(price),
        duration_days: 0,
        min_withdraw: Decimal::ZERO,
        description: String::new(),
        status: PlanStatus::Active,
        direct_referral_limit: 0,
        direct_commissions: Vec::new(),
        indirect_commissions: Vec::new(),
        commission_deductions: CommissionDeductions::default(),
        auto_upgrade: AutoUpgrade::default(),
        hold_position: HoldPosition::default(),
    }
}

pub fn withdrawal_method(name: &str, fee_percent: i64) -> PaymentMethodInput {
    PaymentMethodInput {
        name: name.to_string(),
        kind: MethodKind::Withdrawal,
        account_title: String::new(),
        account_number: String::new(),
        instructions: String::new(),
        min_amount: dec(10),
        max_amount: dec(1000),
        fee_percent: dec(fee_percent),
        status: MethodStatus::Enabled,
    }
}

#[derive(Default)]
pub struct Fixture {
    pub state: LedgerState,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(&mut self, input: PlanInput) -> PlanId {
        let id = Sequences::next(&mut self.state.sequences.plan);
        self.state.investment_plans.insert(id, input.into_plan(id));
        id
    }

    pub fn user(&mut self, username: &str, sponsor: Option<&str>) -> UserId {
        let id = Sequences::next(&mut self.state.sequences.user);
        self.state.users.insert(
            id,
            User {
                id,
                username: username.to_string(),
                full_name: username.to_string(),
                email: format!("{username}@example.com"),
                phone: String::new(),
                whatsapp: None,
                country: None,
                sponsor: sponsor.map(str::to_string),
                wallet_balance: Decimal::ZERO,
                held_balance: Decimal::ZERO,
                active_plans: Default::default(),
                status: UserStatus::Active,
                registration_date: Utc::now(),
            },
        );
        id
    }

    pub fn fund(&mut self, id: UserId, amount: i64) {
        if let Some(user) = self.state.users.get_mut(&id) {
            user.wallet_balance += dec(amount);
        }
    }

    pub fn give_plan(&mut self, id: UserId, plan: &str) {
        if let Some(user) = self.state.users.get_mut(&id) {
            user.active_plans.insert(plan.to_string());
        }
    }

    pub fn work(&self) -> UnitOfWork {
        UnitOfWork::new(self.state.clone())
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::new(
            self.state.clone(),
            Arc::new(MemoryStore),
            Arc::new(BroadcastSink::new(64)),
        )
    }
}

pub fn wallet(state: &LedgerState, id: UserId) -> Decimal {
    state.users[&id].wallet_balance
}

pub fn held(state: &LedgerState, id: UserId) -> Decimal {
    state.users[&id].held_balance
}

pub fn count_of(state: &LedgerState, id: UserId, kind: TransactionType) -> usize {
    state
        .transactions_for(id)
        .filter(|tx| tx.transaction_type == kind)
        .count()
}
