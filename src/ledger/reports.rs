//! Read-only views folded over the ledger document: dashboards, the referral
//! tree and filtered reports.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::plan::highest_plan;
use crate::db::request::{Deposit, DepositStatus, Transfer, TransferStatus, Withdrawal, WithdrawalStatus};
use crate::db::state::LedgerState;
use crate::db::tx::{Transaction, TransactionStatus, TransactionType};
use crate::db::user::{User, UserId, UserStatus};
use crate::db::utils::within_dates;

use super::commission::MAX_COMMISSION_DEPTH;
use super::error::{LedgerError, LedgerResult};
use super::Ledger;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub total_users: usize,
    pub active_users: usize,
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
    pub pending_deposits: usize,
    /// Pending or awaiting a matched deposit.
    pub pending_withdrawals: usize,
    pub pending_transfers: usize,
}

pub fn admin_dashboard(state: &LedgerState) -> AdminDashboard {
    AdminDashboard {
        total_users: state.users.len(),
        active_users: state
            .users
            .values()
            .filter(|user| user.status == UserStatus::Active)
            .count(),
        total_deposits: state
            .deposits
            .values()
            .filter(|d| d.status == DepositStatus::Approved)
            .map(|d| d.amount)
            .sum(),
        total_withdrawals: state
            .withdrawals
            .values()
            .filter(|w| w.status == WithdrawalStatus::Paid)
            .map(|w| w.final_amount)
            .sum(),
        pending_deposits: state
            .deposits
            .values()
            .filter(|d| d.status == DepositStatus::Pending)
            .count(),
        pending_withdrawals: state
            .withdrawals
            .values()
            .filter(|w| matches!(w.status, WithdrawalStatus::Pending | WithdrawalStatus::Matching))
            .count(),
        pending_transfers: state
            .transfers
            .values()
            .filter(|t| t.status == TransferStatus::Pending)
            .count(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDashboard {
    pub wallet_balance: Decimal,
    pub held_balance: Decimal,
    pub total_commission: Decimal,
    pub direct_commission: Decimal,
    pub indirect_commission: Decimal,
    pub pending_commission: Decimal,
    pub monthly_earnings: Decimal,
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
    pub team_size: usize,
    pub active_plan_value: Decimal,
}

pub fn user_dashboard(state: &LedgerState, user_id: UserId, now: DateTime<Utc>) -> LedgerResult<UserDashboard> {
    let user = state
        .user(user_id)
        .ok_or_else(|| LedgerError::not_found("User", user_id))?;

    let commissions = |status: TransactionStatus| {
        state
            .transactions_for(user_id)
            .filter(move |tx| tx.transaction_type == TransactionType::Commission && tx.status == status)
    };
    let total_commission: Decimal = commissions(TransactionStatus::Approved).map(|tx| tx.amount).sum();
    let direct_commission: Decimal = commissions(TransactionStatus::Approved)
        .filter(|tx| tx.level == Some(1))
        .map(|tx| tx.amount)
        .sum();
    let month_start = NaiveDate::from_ymd_opt(now.year(), now.month(), 1);
    let monthly_earnings = commissions(TransactionStatus::Approved)
        .filter(|tx| within_dates(tx.created_at, month_start, None))
        .map(|tx| tx.amount)
        .sum();

    let owned: Vec<String> = user.active_plans.iter().cloned().collect();
    let active_plan_value = highest_plan(user, state.plans_by_name(&owned))
        .map(|plan| plan.price)
        .unwrap_or_default();

    Ok(UserDashboard {
        wallet_balance: user.wallet_balance,
        held_balance: user.held_balance,
        total_commission,
        direct_commission,
        indirect_commission: total_commission - direct_commission,
        pending_commission: commissions(TransactionStatus::Pending).map(|tx| tx.amount).sum(),
        monthly_earnings,
        total_deposits: state
            .deposits
            .values()
            .filter(|d| d.user_id == user_id && d.status == DepositStatus::Approved)
            .map(|d| d.amount)
            .sum(),
        total_withdrawals: state
            .withdrawals
            .values()
            .filter(|w| w.user_id == user_id && w.status == WithdrawalStatus::Paid)
            .map(|w| w.final_amount)
            .sum(),
        team_size: team_size(state, &user.username, 1),
        active_plan_value,
    })
}

fn team_size(state: &LedgerState, username: &str, depth: u32) -> usize {
    if depth > MAX_COMMISSION_DEPTH {
        return 0;
    }
    state
        .direct_referrals(username)
        .map(|child| 1 + team_size(state, &child.username, depth + 1))
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenealogyNode {
    pub user_id: UserId,
    pub username: String,
    pub full_name: String,
    pub status: UserStatus,
    /// What the tree's root has earned from this member's deposits.
    pub commission_earned: Decimal,
    pub children: Vec<GenealogyNode>,
}

pub fn genealogy(state: &LedgerState, user_id: UserId) -> LedgerResult<Vec<GenealogyNode>> {
    let root = state
        .user(user_id)
        .ok_or_else(|| LedgerError::not_found("User", user_id))?;
    Ok(branch(state, root.id, &root.username, 1))
}

fn branch(state: &LedgerState, root: UserId, username: &str, depth: u32) -> Vec<GenealogyNode> {
    if depth > MAX_COMMISSION_DEPTH {
        return Vec::new();
    }
    state
        .direct_referrals(username)
        .map(|member| GenealogyNode {
            user_id: member.id,
            username: member.username.clone(),
            full_name: member.full_name.clone(),
            status: member.status,
            commission_earned: state
                .transactions_for(root)
                .filter(|tx| {
                    matches!(
                        tx.transaction_type,
                        TransactionType::Commission | TransactionType::HeldCommission
                    ) && tx.source_user_id == Some(member.id)
                })
                .map(|tx| tx.amount)
                .sum(),
            children: branch(state, root, &member.username, depth + 1),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Deposits,
    Withdrawals,
    Transfers,
    Users,
    Commissions,
    AllTransactions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub kind: ReportKind,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<String>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub keyword: Option<String>,
}

impl ReportQuery {
    #[cfg(test)]
    pub fn of(kind: ReportKind) -> Self {
        Self {
            kind,
            from: None,
            to: None,
            status: None,
            min_amount: None,
            max_amount: None,
            keyword: None,
        }
    }

    fn admits(&self, row: &impl ReportRow) -> bool {
        if !within_dates(row.at(), self.from, self.to) {
            return false;
        }
        if let Some(status) = self.status.as_deref().filter(|s| !s.is_empty()) {
            if row.status() != status {
                return false;
            }
        }
        if let Some(amount) = row.amount() {
            if self.min_amount.is_some_and(|min| amount < min) || self.max_amount.is_some_and(|max| amount > max) {
                return false;
            }
        }
        match self.keyword.as_deref().filter(|k| !k.is_empty()) {
            Some(keyword) => {
                let needle = keyword.to_lowercase();
                row.haystack()
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }
}

trait ReportRow {
    fn at(&self) -> DateTime<Utc>;
    fn status(&self) -> String;
    fn amount(&self) -> Option<Decimal>;
    fn haystack(&self) -> Vec<&str>;
}

impl ReportRow for Deposit {
    fn at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn status(&self) -> String {
        format!("{:?}", self.status)
    }
    fn amount(&self) -> Option<Decimal> {
        Some(self.amount)
    }
    fn haystack(&self) -> Vec<&str> {
        vec![&self.id, &self.user_name, &self.method, &self.transaction_id]
    }
}

impl ReportRow for Withdrawal {
    fn at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn status(&self) -> String {
        format!("{:?}", self.status)
    }
    fn amount(&self) -> Option<Decimal> {
        Some(self.amount)
    }
    fn haystack(&self) -> Vec<&str> {
        vec![&self.id, &self.user_name, &self.method]
    }
}

impl ReportRow for Transfer {
    fn at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn status(&self) -> String {
        format!("{:?}", self.status)
    }
    fn amount(&self) -> Option<Decimal> {
        Some(self.amount)
    }
    fn haystack(&self) -> Vec<&str> {
        vec![&self.id, &self.sender_name, &self.recipient_name]
    }
}

impl ReportRow for User {
    fn at(&self) -> DateTime<Utc> {
        self.registration_date
    }
    fn status(&self) -> String {
        format!("{:?}", self.status)
    }
    fn amount(&self) -> Option<Decimal> {
        None
    }
    fn haystack(&self) -> Vec<&str> {
        vec![&self.username, &self.full_name, &self.email]
    }
}

impl ReportRow for Transaction {
    fn at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn status(&self) -> String {
        format!("{:?}", self.status)
    }
    fn amount(&self) -> Option<Decimal> {
        Some(self.amount)
    }
    fn haystack(&self) -> Vec<&str> {
        vec![&self.user_name, &self.description]
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum Report {
    Deposits(Vec<Deposit>),
    Withdrawals(Vec<Withdrawal>),
    Transfers(Vec<Transfer>),
    Users(Vec<User>),
    Commissions(Vec<Transaction>),
    AllTransactions(Vec<Transaction>),
}

impl Report {
    pub fn len(&self) -> usize {
        match self {
            Report::Deposits(rows) => rows.len(),
            Report::Withdrawals(rows) => rows.len(),
            Report::Transfers(rows) => rows.len(),
            Report::Users(rows) => rows.len(),
            Report::Commissions(rows) | Report::AllTransactions(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn pick<'a, T: ReportRow + Clone + 'a>(query: &ReportQuery, rows: impl Iterator<Item = &'a T>) -> Vec<T> {
    rows.filter(|row| query.admits(*row)).cloned().collect()
}

pub fn report(state: &LedgerState, query: &ReportQuery) -> Report {
    match query.kind {
        ReportKind::Deposits => Report::Deposits(pick(query, state.deposits.values())),
        ReportKind::Withdrawals => Report::Withdrawals(pick(query, state.withdrawals.values())),
        ReportKind::Transfers => Report::Transfers(pick(query, state.transfers.values())),
        ReportKind::Users => Report::Users(pick(query, state.users.values())),
        ReportKind::Commissions => Report::Commissions(pick(
            query,
            state
                .transactions
                .iter()
                .filter(|tx| tx.transaction_type == TransactionType::Commission),
        )),
        ReportKind::AllTransactions => Report::AllTransactions(pick(query, state.transactions.iter())),
    }
}

impl Ledger {
    pub async fn admin_dashboard(&self) -> AdminDashboard {
        self.read(admin_dashboard).await
    }

    pub async fn user_dashboard(&self, user_id: UserId) -> LedgerResult<UserDashboard> {
        self.read(|state| user_dashboard(state, user_id, Utc::now())).await
    }

    pub async fn genealogy(&self, user_id: UserId) -> LedgerResult<Vec<GenealogyNode>> {
        self.read(|state| genealogy(state, user_id)).await
    }

    pub async fn report(&self, query: &ReportQuery) -> Report {
        self.read(|state| report(state, query)).await
    }

    /// Newest first, optionally limited to one user.
    pub async fn transactions(&self, user_id: Option<UserId>) -> Vec<Transaction> {
        self.read(|state| {
            state
                .transactions
                .iter()
                .rev()
                .filter(|tx| user_id.map_or(true, |id| tx.user_id == id))
                .cloned()
                .collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::db::request::{NewDeposit, NewWithdrawal, StatusUpdate};
    use crate::ledger::deposit::{create_deposit, update_deposit};
    use crate::ledger::withdrawal::{create_withdrawal, update_withdrawal};
    use crate::ledger::testing::*;

    /// root ← alice ← bob, root and alice on Gold (10% direct, 5% level 2),
    /// with one approved $100 deposit from each of alice and bob.
    fn network() -> (LedgerState, UserId, UserId, UserId) {
        let mut fx = Fixture::new();
        let mut gold = plan("Gold", 200);
        gold.direct_commissions = vec![pct(10)];
        gold.indirect_commissions = vec![pct(5)];
        fx.plan(gold);
        let root = fx.user("root", None);
        fx.give_plan(root, "Gold");
        let alice = fx.user("alice", Some("root"));
        fx.give_plan(alice, "Gold");
        let bob = fx.user("bob", Some("alice"));

        let mut uow = fx.work();
        for user_id in [alice, bob] {
            let deposit = create_deposit(
                &mut uow,
                NewDeposit {
                    user_id,
                    amount: dec(100),
                    method: "USDT".to_string(),
                    transaction_id: format!("chain-{user_id}"),
                    matched_withdrawal_id: None,
                    user_notes: None,
                },
            )
            .unwrap();
            update_deposit(
                &mut uow,
                &deposit.id,
                StatusUpdate {
                    status: DepositStatus::Approved,
                    admin_notes: None,
                },
            )
            .unwrap();
        }
        (uow.into_parts().0, root, alice, bob)
    }

    #[test]
    fn admin_totals() {
        let (state, ..) = network();
        let dashboard = admin_dashboard(&state);
        assert_eq!(dashboard.total_users, 3);
        assert_eq!(dashboard.active_users, 3);
        assert_eq!(dashboard.total_deposits, dec(200));
        assert_eq!(dashboard.pending_deposits, 0);
    }

    #[test]
    fn matching_withdrawals_count_as_pending() {
        let (state, root, alice, _) = network();
        let mut uow = Fixture { state }.work();
        let mut ids = Vec::new();
        for user_id in [root, alice] {
            let withdrawal = create_withdrawal(
                &mut uow,
                NewWithdrawal {
                    user_id,
                    amount: dec(10),
                    method: String::new(),
                    fee: Decimal::ZERO,
                    account_title: "Savings".to_string(),
                    account_number: "0001".to_string(),
                    user_notes: None,
                },
            )
            .unwrap();
            ids.push(withdrawal.id);
        }
        let matching = StatusUpdate {
            status: WithdrawalStatus::Matching,
            admin_notes: None,
        };
        update_withdrawal(&mut uow, &ids[0], matching).unwrap();

        assert_eq!(admin_dashboard(uow.state()).pending_withdrawals, 2);
    }

    #[test]
    fn user_totals_split_direct_and_indirect() {
        let (state, root, ..) = network();
        let dashboard = user_dashboard(&state, root, Utc::now()).unwrap();
        assert_eq!(dashboard.total_commission, dec(15));
        assert_eq!(dashboard.direct_commission, dec(10));
        assert_eq!(dashboard.indirect_commission, dec(5));
        assert_eq!(dashboard.monthly_earnings, dec(15));
        assert_eq!(dashboard.team_size, 2);
        assert_eq!(dashboard.active_plan_value, dec(200));
        assert_eq!(dashboard.wallet_balance, dec(15));

        let next_year = Utc::now() + Duration::days(400);
        assert_eq!(user_dashboard(&state, root, next_year).unwrap().monthly_earnings, dec(0));
    }

    #[test]
    fn genealogy_attributes_commission_to_each_member() {
        let (state, root, alice, bob) = network();
        let tree = genealogy(&state, root).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].user_id, alice);
        assert_eq!(tree[0].commission_earned, dec(10));
        assert_eq!(tree[0].children[0].user_id, bob);
        assert_eq!(tree[0].children[0].commission_earned, dec(5));
        assert!(matches!(genealogy(&state, 77), Err(LedgerError::NotFound { .. })));
    }

    #[test]
    fn reports_filter_by_kind_and_fields() {
        let (state, ..) = network();
        assert_eq!(report(&state, &ReportQuery::of(ReportKind::Commissions)).len(), 3);
        assert_eq!(report(&state, &ReportQuery::of(ReportKind::Users)).len(), 3);

        let mut query = ReportQuery::of(ReportKind::AllTransactions);
        query.keyword = Some("BOB".to_string());
        // bob's deposit plus the two commissions paid from it
        assert_eq!(report(&state, &query).len(), 3);

        let mut query = ReportQuery::of(ReportKind::Commissions);
        query.min_amount = Some(dec(10));
        assert_eq!(report(&state, &query).len(), 2);

        let mut query = ReportQuery::of(ReportKind::Deposits);
        query.status = Some("Pending".to_string());
        assert!(report(&state, &query).is_empty());
    }

    #[test]
    fn report_dates_are_inclusive_days() {
        let (mut state, ..) = network();
        let day = Utc.with_ymd_and_hms(2023, 10, 26, 23, 59, 0).unwrap();
        for tx in &mut state.transactions {
            tx.created_at = day;
        }
        let mut query = ReportQuery::of(ReportKind::AllTransactions);
        query.from = NaiveDate::from_ymd_opt(2023, 10, 26);
        query.to = query.from;
        assert_eq!(report(&state, &query).len(), state.transactions.len());

        query.from = NaiveDate::from_ymd_opt(2023, 10, 27);
        query.to = None;
        assert!(report(&state, &query).is_empty());
    }
}
