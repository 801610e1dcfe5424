use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::db::admin::MethodKind;
use crate::db::plan::PlanStatus;
use crate::db::request::{NewWithdrawal, StatusUpdate, Withdrawal, WithdrawalStatus};
use crate::db::tx::{NewTransaction, TransactionStatus, TransactionType};
use crate::db::user::UserId;
use crate::db::utils::generate_id;

use super::deposit::{check_method, ensure_not_blocked, ensure_positive};
use super::error::{LedgerError, LedgerResult};
use super::unit::UnitOfWork;
use super::Ledger;

fn check_amount_rules(uow: &UnitOfWork, amount: Decimal) -> LedgerResult<()> {
    let settings = uow.settings();
    if amount < settings.site_wide_min_withdrawal {
        return Err(LedgerError::validation(format!(
            "minimum withdrawal is {}",
            uow.money(settings.site_wide_min_withdrawal)
        )));
    }
    if settings.restrict_withdrawal_amount {
        let matches_plan = uow
            .state()
            .investment_plans
            .values()
            .any(|plan| plan.status == PlanStatus::Active && plan.price == amount);
        if !matches_plan {
            return Err(LedgerError::validation(
                "withdrawal amount must match the price of an active plan",
            ));
        }
    }
    Ok(())
}

/// Debits the full amount up front and records a pending request entry.
pub fn create_withdrawal(uow: &mut UnitOfWork, request: NewWithdrawal) -> LedgerResult<Withdrawal> {
    ensure_positive(request.amount)?;
    ensure_not_blocked(uow, request.user_id)?;
    check_amount_rules(uow, request.amount)?;

    let fee = match check_method(uow, &request.method, MethodKind::Withdrawal, request.amount)? {
        Some(fee_percent) => request.amount * fee_percent / Decimal::ONE_HUNDRED,
        None => request.fee,
    };
    if fee < Decimal::ZERO || fee > request.amount {
        return Err(LedgerError::validation("fee must be between zero and the amount"));
    }
    uow.ensure_funds(request.user_id, request.amount)?;

    let user_name = uow.user(request.user_id)?.username.clone();
    let withdrawal = Withdrawal {
        id: generate_id("wdr"),
        user_id: request.user_id,
        user_name,
        method: request.method,
        amount: request.amount,
        fee,
        final_amount: request.amount - fee,
        account_title: request.account_title,
        account_number: request.account_number,
        status: WithdrawalStatus::Pending,
        match_remaining_amount: None,
        admin_notes: None,
        user_notes: request.user_notes,
        created_at: uow.now(),
        updated_at: uow.now(),
    };

    uow.debit_wallet(withdrawal.user_id, withdrawal.amount)?;
    uow.record_transaction(
        NewTransaction::new(
            withdrawal.user_id,
            TransactionType::WithdrawalRequest,
            -withdrawal.amount,
            TransactionStatus::Pending,
            format!("Withdrawal request #{}", withdrawal.id),
        )
        .related_to(&withdrawal.id),
    )?;
    uow.state_mut()
        .withdrawals
        .insert(withdrawal.id.clone(), withdrawal.clone());

    let message = format!(
        "Your withdrawal request #{} for {} has been submitted.",
        withdrawal.id,
        uow.money(withdrawal.amount)
    );
    uow.notify(withdrawal.user_id, message);
    info!(withdrawal = %withdrawal.id, user_id = withdrawal.user_id, "withdrawal requested");
    Ok(withdrawal)
}

fn request_status(status: WithdrawalStatus) -> TransactionStatus {
    match status {
        WithdrawalStatus::Pending | WithdrawalStatus::Matching => TransactionStatus::Pending,
        WithdrawalStatus::Approved | WithdrawalStatus::Paid => TransactionStatus::Approved,
        WithdrawalStatus::Rejected => TransactionStatus::Rejected,
    }
}

pub fn update_withdrawal(
    uow: &mut UnitOfWork,
    id: &str,
    update: StatusUpdate<WithdrawalStatus>,
) -> LedgerResult<Withdrawal> {
    let mut withdrawal = uow
        .state()
        .withdrawals
        .get(id)
        .cloned()
        .ok_or_else(|| LedgerError::not_found("Withdrawal", id))?;

    let from = withdrawal.status;
    let to = update.status;
    if from == to {
        debug!(withdrawal = id, status = ?to, "withdrawal already in requested status");
        return Ok(withdrawal);
    }
    if from == WithdrawalStatus::Paid {
        return Err(LedgerError::transition("Withdrawal", from, to));
    }

    if from == WithdrawalStatus::Rejected {
        uow.ensure_funds(withdrawal.user_id, withdrawal.amount)?;
        uow.debit_wallet(withdrawal.user_id, withdrawal.amount)?;
    }
    match to {
        WithdrawalStatus::Rejected => {
            uow.credit_wallet(withdrawal.user_id, withdrawal.amount)?;
            uow.record_transaction(
                NewTransaction::new(
                    withdrawal.user_id,
                    TransactionType::WithdrawalRefund,
                    withdrawal.amount,
                    TransactionStatus::Approved,
                    format!("Refund for rejected withdrawal #{id}"),
                )
                .related_to(id),
            )?;
        }
        WithdrawalStatus::Matching => {
            withdrawal.match_remaining_amount = Some(withdrawal.final_amount);
        }
        WithdrawalStatus::Paid => {
            uow.record_transaction(
                NewTransaction::new(
                    withdrawal.user_id,
                    TransactionType::Withdrawal,
                    -withdrawal.final_amount,
                    TransactionStatus::Approved,
                    format!("Withdrawal #{id} paid"),
                )
                .related_to(id),
            )?;
        }
        WithdrawalStatus::Pending | WithdrawalStatus::Approved => {}
    }
    uow.update_related_transaction(id, TransactionType::WithdrawalRequest, |tx| {
        tx.status = request_status(to);
    });

    withdrawal.status = to;
    if update.admin_notes.is_some() {
        withdrawal.admin_notes = update.admin_notes;
    }
    withdrawal.updated_at = uow.now();
    uow.state_mut()
        .withdrawals
        .insert(withdrawal.id.clone(), withdrawal.clone());

    let verdict = match to {
        WithdrawalStatus::Pending => "moved back to pending",
        WithdrawalStatus::Matching => "queued for matching",
        WithdrawalStatus::Approved => "approved",
        WithdrawalStatus::Paid => "paid",
        WithdrawalStatus::Rejected => "rejected",
    };
    let message = format!(
        "Your withdrawal request #{id} for {} has been {verdict}.",
        uow.money(withdrawal.amount)
    );
    uow.notify(withdrawal.user_id, message);
    if to == WithdrawalStatus::Rejected {
        warn!(withdrawal = id, from = ?from, "withdrawal rejected and refunded");
    } else {
        info!(withdrawal = id, from = ?from, to = ?to, "withdrawal updated");
    }
    Ok(withdrawal)
}

impl Ledger {
    pub async fn create_withdrawal(&self, request: NewWithdrawal) -> LedgerResult<Withdrawal> {
        self.transact(|uow| create_withdrawal(uow, request)).await
    }

    pub async fn update_withdrawal(
        &self,
        id: &str,
        update: StatusUpdate<WithdrawalStatus>,
    ) -> LedgerResult<Withdrawal> {
        self.transact(|uow| update_withdrawal(uow, id, update)).await
    }

    pub async fn withdrawals(&self, user_id: Option<UserId>) -> Vec<Withdrawal> {
        self.read(|state| {
            state
                .withdrawals
                .values()
                .filter(|withdrawal| user_id.map_or(true, |id| withdrawal.user_id == id))
                .cloned()
                .collect()
        })
        .await
    }

    /// Withdrawals other members can pay with a matched deposit.
    pub async fn matching_withdrawals(&self, exclude: Option<UserId>) -> Vec<Withdrawal> {
        self.read(|state| {
            state
                .withdrawals
                .values()
                .filter(|w| w.status == WithdrawalStatus::Matching && Some(w.user_id) != exclude)
                .cloned()
                .collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::state::LedgerState;
    use crate::ledger::testing::*;

    fn request(user_id: UserId, amount: i64) -> NewWithdrawal {
        NewWithdrawal {
            user_id,
            amount: dec(amount),
            method: String::new(),
            fee: Decimal::ZERO,
            account_title: "Alice".to_string(),
            account_number: "0001".to_string(),
            user_notes: None,
        }
    }

    fn status(status: WithdrawalStatus) -> StatusUpdate<WithdrawalStatus> {
        StatusUpdate {
            status,
            admin_notes: None,
        }
    }

    fn request_entry(state: &LedgerState, id: &str) -> TransactionStatus {
        state
            .transactions
            .iter()
            .find(|tx| {
                tx.transaction_type == TransactionType::WithdrawalRequest
                    && tx.related_entity_id.as_deref() == Some(id)
            })
            .map(|tx| tx.status)
            .unwrap()
    }

    #[test]
    fn creation_debits_the_full_amount() {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", None);
        fx.fund(alice, 100);
        let mut uow = fx.work();

        let withdrawal = create_withdrawal(&mut uow, request(alice, 60)).unwrap();
        assert!(withdrawal.id.starts_with("WDR-"));
        assert_eq!(wallet(uow.state(), alice), dec(40));
        assert_eq!(request_entry(uow.state(), &withdrawal.id), TransactionStatus::Pending);
        let entry = uow.state().transactions.last().unwrap();
        assert_eq!(entry.amount, dec(-60));
    }

    #[test]
    fn insufficient_funds_changes_nothing() {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", None);
        fx.fund(alice, 20);
        let mut uow = fx.work();

        let err = create_withdrawal(&mut uow, request(alice, 50)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(wallet(uow.state(), alice), dec(20));
        assert!(uow.state().withdrawals.is_empty());
        assert!(uow.state().transactions.is_empty());
        assert!(uow.state().notifications.is_empty());
    }

    #[test]
    fn amount_rules_are_enforced() {
        let mut fx = Fixture::new();
        fx.plan(plan("Gold", 200));
        let alice = fx.user("alice", None);
        fx.fund(alice, 1000);
        fx.state.settings.restrict_withdrawal_amount = true;
        let mut uow = fx.work();

        assert!(matches!(
            create_withdrawal(&mut uow, request(alice, 5)),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            create_withdrawal(&mut uow, request(alice, 150)),
            Err(LedgerError::Validation(_))
        ));
        assert!(create_withdrawal(&mut uow, request(alice, 200)).is_ok());
    }

    #[test]
    fn method_fee_is_a_percentage_of_the_amount() {
        let mut fx = Fixture::new();
        fx.state
            .payment_methods
            .insert(1, withdrawal_method("Bank", 5).into_method(1));
        let alice = fx.user("alice", None);
        fx.fund(alice, 500);
        let mut uow = fx.work();

        let mut bank = request(alice, 200);
        bank.method = "Bank".to_string();
        let withdrawal = create_withdrawal(&mut uow, bank).unwrap();
        assert_eq!(withdrawal.fee, dec(10));
        assert_eq!(withdrawal.final_amount, dec(190));
        assert_eq!(wallet(uow.state(), alice), dec(300));
    }

    #[test]
    fn rejection_refunds_and_reopening_debits_again() {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", None);
        fx.fund(alice, 100);
        let mut uow = fx.work();
        let withdrawal = create_withdrawal(&mut uow, request(alice, 60)).unwrap();

        update_withdrawal(&mut uow, &withdrawal.id, status(WithdrawalStatus::Rejected)).unwrap();
        assert_eq!(wallet(uow.state(), alice), dec(100));
        assert_eq!(count_of(uow.state(), alice, TransactionType::WithdrawalRefund), 1);
        assert_eq!(request_entry(uow.state(), &withdrawal.id), TransactionStatus::Rejected);

        update_withdrawal(&mut uow, &withdrawal.id, status(WithdrawalStatus::Pending)).unwrap();
        assert_eq!(wallet(uow.state(), alice), dec(40));
        assert_eq!(request_entry(uow.state(), &withdrawal.id), TransactionStatus::Pending);
    }

    #[test]
    fn reopening_needs_funds_for_the_debit() {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", None);
        fx.fund(alice, 100);
        let mut uow = fx.work();
        let withdrawal = create_withdrawal(&mut uow, request(alice, 60)).unwrap();
        update_withdrawal(&mut uow, &withdrawal.id, status(WithdrawalStatus::Rejected)).unwrap();
        uow.debit_wallet(alice, dec(90)).unwrap();

        let err = update_withdrawal(&mut uow, &withdrawal.id, status(WithdrawalStatus::Approved)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    }

    #[test]
    fn matching_sets_the_remaining_amount() {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", None);
        fx.fund(alice, 100);
        let mut uow = fx.work();
        let mut req = request(alice, 50);
        req.fee = dec(5);
        let withdrawal = create_withdrawal(&mut uow, req).unwrap();

        let matching = update_withdrawal(&mut uow, &withdrawal.id, status(WithdrawalStatus::Matching)).unwrap();
        assert_eq!(matching.match_remaining_amount, Some(dec(45)));
        assert_eq!(wallet(uow.state(), alice), dec(50));
    }

    #[test]
    fn paid_withdrawals_are_final() {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", None);
        fx.fund(alice, 100);
        let mut uow = fx.work();
        let withdrawal = create_withdrawal(&mut uow, request(alice, 60)).unwrap();
        update_withdrawal(&mut uow, &withdrawal.id, status(WithdrawalStatus::Paid)).unwrap();

        assert_eq!(count_of(uow.state(), alice, TransactionType::Withdrawal), 1);
        assert_eq!(request_entry(uow.state(), &withdrawal.id), TransactionStatus::Approved);
        let err = update_withdrawal(&mut uow, &withdrawal.id, status(WithdrawalStatus::Rejected)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
        assert_eq!(wallet(uow.state(), alice), dec(40));
    }

    #[tokio::test]
    async fn matching_list_hides_own_requests() {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", None);
        let bob = fx.user("bob", None);
        fx.fund(alice, 100);
        let ledger = fx.ledger();
        let withdrawal = ledger.create_withdrawal(request(alice, 50)).await.unwrap();
        ledger
            .update_withdrawal(&withdrawal.id, status(WithdrawalStatus::Matching))
            .await
            .unwrap();

        assert_eq!(ledger.matching_withdrawals(Some(bob)).await.len(), 1);
        assert!(ledger.matching_withdrawals(Some(alice)).await.is_empty());
        assert_eq!(ledger.withdrawals(Some(alice)).await.len(), 1);
    }
}
