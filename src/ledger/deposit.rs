use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::db::admin::{MethodKind, MethodStatus};
use crate::db::request::{Deposit, DepositStatus, NewDeposit, StatusUpdate, WithdrawalStatus};
use crate::db::tx::{NewTransaction, TransactionStatus, TransactionType};
use crate::db::user::UserId;
use crate::db::utils::generate_id;

use super::commission;
use super::error::{LedgerError, LedgerResult};
use super::unit::UnitOfWork;
use super::Ledger;

/// Checks `amount` against the named payment method when the catalog knows
/// it. Free-text method names are accepted as-is.
pub(crate) fn check_method(uow: &UnitOfWork, name: &str, kind: MethodKind, amount: Decimal) -> LedgerResult<Option<Decimal>> {
    let Some(method) = uow
        .state()
        .payment_methods
        .values()
        .find(|method| method.name == name)
    else {
        return Ok(None);
    };
    if method.kind != kind || method.status != MethodStatus::Enabled {
        return Err(LedgerError::validation(format!(
            "payment method {name} is not available"
        )));
    }
    if amount < method.min_amount || amount > method.max_amount {
        return Err(LedgerError::validation(format!(
            "amount must be between {} and {}",
            uow.money(method.min_amount),
            uow.money(method.max_amount)
        )));
    }
    Ok(Some(method.fee_percent))
}

pub(crate) fn ensure_positive(amount: Decimal) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation("amount must be positive"));
    }
    Ok(())
}

pub(crate) fn ensure_not_blocked(uow: &UnitOfWork, user_id: UserId) -> LedgerResult<()> {
    if uow.user(user_id)?.is_blocked() {
        return Err(LedgerError::Forbidden(format!("user {user_id} is blocked")));
    }
    Ok(())
}

/// Records a pending deposit. Nothing moves until an admin approves it.
pub fn create_deposit(uow: &mut UnitOfWork, request: NewDeposit) -> LedgerResult<Deposit> {
    ensure_positive(request.amount)?;
    ensure_not_blocked(uow, request.user_id)?;
    check_method(uow, &request.method, MethodKind::Deposit, request.amount)?;

    if let Some(withdrawal_id) = &request.matched_withdrawal_id {
        let withdrawal = uow
            .state()
            .withdrawals
            .get(withdrawal_id)
            .ok_or_else(|| LedgerError::not_found("Withdrawal", withdrawal_id))?;
        if withdrawal.status != WithdrawalStatus::Matching {
            return Err(LedgerError::validation(format!(
                "withdrawal {withdrawal_id} is not open for matching"
            )));
        }
        if withdrawal.user_id == request.user_id {
            return Err(LedgerError::validation("cannot match your own withdrawal"));
        }
    }

    let user_name = uow.user(request.user_id)?.username.clone();
    let deposit = Deposit {
        id: generate_id("dep"),
        user_id: request.user_id,
        user_name,
        method: request.method,
        amount: request.amount,
        transaction_id: request.transaction_id,
        status: DepositStatus::Pending,
        matched_withdrawal_id: request.matched_withdrawal_id,
        admin_notes: None,
        user_notes: request.user_notes,
        created_at: uow.now(),
        updated_at: uow.now(),
    };
    uow.state_mut().deposits.insert(deposit.id.clone(), deposit.clone());

    let message = format!(
        "Your deposit request #{} for {} has been submitted.",
        deposit.id,
        uow.money(deposit.amount)
    );
    uow.notify(deposit.user_id, message);
    info!(deposit = %deposit.id, user_id = deposit.user_id, "deposit requested");
    Ok(deposit)
}

/// Moves a deposit to a new status and applies the money effects of the
/// transition.
pub fn update_deposit(uow: &mut UnitOfWork, id: &str, update: StatusUpdate<DepositStatus>) -> LedgerResult<Deposit> {
    let mut deposit = uow
        .state()
        .deposits
        .get(id)
        .cloned()
        .ok_or_else(|| LedgerError::not_found("Deposit", id))?;

    let from = deposit.status;
    let to = update.status;
    if from == to {
        debug!(deposit = id, status = ?to, "deposit already in requested status");
        return Ok(deposit);
    }
    if to == DepositStatus::Pending {
        return Err(LedgerError::transition("Deposit", from, to));
    }

    if to == DepositStatus::Approved {
        approve(uow, &deposit)?;
    } else if from == DepositStatus::Approved {
        // commissions already paid for this deposit stand
        uow.debit_wallet(deposit.user_id, deposit.amount)?;
        uow.update_related_transaction(&deposit.id, TransactionType::Deposit, |tx| {
            tx.status = TransactionStatus::Rejected;
        });
        warn!(deposit = id, "approved deposit reversed");
    }

    deposit.status = to;
    if update.admin_notes.is_some() {
        deposit.admin_notes = update.admin_notes;
    }
    deposit.updated_at = uow.now();
    uow.state_mut().deposits.insert(deposit.id.clone(), deposit.clone());

    let verdict = match to {
        DepositStatus::Approved => "approved",
        DepositStatus::Rejected => "rejected",
        DepositStatus::Pending => "pending",
    };
    let message = format!(
        "Your deposit #{} for {} has been {verdict}.",
        deposit.id,
        uow.money(deposit.amount)
    );
    uow.notify(deposit.user_id, message);
    info!(deposit = id, from = ?from, to = ?to, "deposit updated");
    Ok(deposit)
}

fn approve(uow: &mut UnitOfWork, deposit: &Deposit) -> LedgerResult<()> {
    uow.credit_wallet(deposit.user_id, deposit.amount)?;
    uow.record_transaction(
        NewTransaction::new(
            deposit.user_id,
            TransactionType::Deposit,
            deposit.amount,
            TransactionStatus::Approved,
            format!("Approved Deposit #{}", deposit.id),
        )
        .related_to(&deposit.id),
    )?;

    match &deposit.matched_withdrawal_id {
        Some(withdrawal_id) => commission::settle_matched_withdrawal(uow, deposit, withdrawal_id),
        None => commission::distribute(uow, deposit).map(|_| ()),
    }
}

impl Ledger {
    pub async fn create_deposit(&self, request: NewDeposit) -> LedgerResult<Deposit> {
        self.transact(|uow| create_deposit(uow, request)).await
    }

    pub async fn update_deposit(&self, id: &str, update: StatusUpdate<DepositStatus>) -> LedgerResult<Deposit> {
        self.transact(|uow| update_deposit(uow, id, update)).await
    }

    pub async fn deposits(&self, user_id: Option<UserId>) -> Vec<Deposit> {
        self.read(|state| {
            state
                .deposits
                .values()
                .filter(|deposit| user_id.map_or(true, |id| deposit.user_id == id))
                .cloned()
                .collect()
        })
        .await
    }
}
