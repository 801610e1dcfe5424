use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::admin::{Notification, PaymentMethod, Rule, Settings};
use super::plan::{InvestmentPlan, PlanId};
use super::request::{Deposit, Transfer, Withdrawal};
use super::tx::Transaction;
use super::user::{User, UserId};

/// The whole ledger as one document. This is what the stores load and save,
/// and what a unit of work stages its changes against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerState {
    pub users: BTreeMap<UserId, User>,
    pub investment_plans: BTreeMap<PlanId, InvestmentPlan>,
    pub deposits: BTreeMap<String, Deposit>,
    pub withdrawals: BTreeMap<String, Withdrawal>,
    pub transfers: BTreeMap<String, Transfer>,
    pub transactions: Vec<Transaction>,
    pub payment_methods: BTreeMap<u64, PaymentMethod>,
    pub rules: BTreeMap<u64, Rule>,
    pub notifications: Vec<Notification>,
    pub settings: Settings,
    pub sequences: Sequences,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sequences {
    pub user: u64,
    pub plan: u64,
    pub payment_method: u64,
    pub rule: u64,
    pub notification: u64,
}

impl Sequences {
    pub fn next(counter: &mut u64) -> u64 {
        *counter += 1;
        *counter
    }
}

impl LedgerState {
    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|user| user.username == username)
    }

    pub fn plan(&self, id: PlanId) -> Option<&InvestmentPlan> {
        self.investment_plans.get(&id)
    }

    pub fn plans_by_name<'a>(&'a self, names: &'a [String]) -> impl Iterator<Item = &'a InvestmentPlan> {
        self.investment_plans
            .values()
            .filter(move |plan| names.iter().any(|name| *name == plan.name))
    }

    pub fn direct_referrals<'a>(&'a self, username: &'a str) -> impl Iterator<Item = &'a User> {
        self.users
            .values()
            .filter(move |user| user.sponsor.as_deref() == Some(username))
    }

    pub fn direct_referral_count(&self, username: &str) -> usize {
        self.direct_referrals(username).count()
    }

    pub fn transactions_for(&self, user_id: UserId) -> impl DoubleEndedIterator<Item = &Transaction> + '_ {
        self.transactions.iter().filter(move |tx| tx.user_id == user_id)
    }

    pub fn notifications_for(&self, user_id: UserId) -> impl DoubleEndedIterator<Item = &Notification> + '_ {
        self.notifications.iter().filter(move |n| n.user_id == user_id)
    }
}
