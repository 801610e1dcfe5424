use rust_decimal::Decimal;
use tracing::info;

use crate::db::plan::{PlanId, PlanStatus};
use crate::db::tx::{NewTransaction, TransactionStatus, TransactionType};
use crate::db::user::{User, UserId};

use super::deposit::ensure_not_blocked;
use super::error::{LedgerError, LedgerResult};
use super::unit::UnitOfWork;
use super::Ledger;

pub fn purchase_plan(uow: &mut UnitOfWork, user_id: UserId, plan_id: PlanId) -> LedgerResult<User> {
    ensure_not_blocked(uow, user_id)?;
    let plan = uow
        .state()
        .plan(plan_id)
        .cloned()
        .ok_or_else(|| LedgerError::not_found("InvestmentPlan", plan_id))?;
    if plan.status != PlanStatus::Active {
        return Err(LedgerError::validation(format!("plan {} is not available", plan.name)));
    }
    if !uow.settings().allow_plan_repurchase && uow.user(user_id)?.owns_plan(&plan.name) {
        return Err(LedgerError::InvalidStateTransition {
            entity: "InvestmentPlan",
            from: "owned".to_string(),
            to: "purchased".to_string(),
        });
    }
    uow.ensure_funds(user_id, plan.price)?;

    uow.debit_wallet(user_id, plan.price)?;
    uow.user_mut(user_id)?.active_plans.insert(plan.name.clone());
    uow.record_transaction(
        NewTransaction::new(
            user_id,
            TransactionType::PlanPurchase,
            -plan.price,
            TransactionStatus::Approved,
            format!("Purchased {} plan", plan.name),
        )
        .related_to(plan.id.to_string()),
    )?;
    let message = format!(
        "You have purchased the {} plan for {}.",
        plan.name,
        uow.money(plan.price)
    );
    uow.notify(user_id, message);
    info!(user_id, plan = %plan.name, "plan purchased");
    uow.user(user_id).cloned()
}

/// Admin correction of a wallet. Positive amounts credit, negative amounts
/// debit; the balance may go below zero.
pub fn adjust_wallet(
    uow: &mut UnitOfWork,
    user_id: UserId,
    amount: Decimal,
    reason: Option<String>,
) -> LedgerResult<User> {
    if amount.is_zero() {
        return Err(LedgerError::validation("adjustment amount cannot be zero"));
    }
    let (kind, verb) = if amount > Decimal::ZERO {
        uow.credit_wallet(user_id, amount)?;
        (TransactionType::ManualCredit, "credited")
    } else {
        uow.debit_wallet(user_id, -amount)?;
        (TransactionType::ManualDebit, "debited")
    };
    let description = reason.unwrap_or_else(|| "Manual wallet adjustment by admin".to_string());
    uow.record_transaction(NewTransaction::new(
        user_id,
        kind,
        amount,
        TransactionStatus::Approved,
        description,
    ))?;
    let message = format!("Your wallet was {verb} {} by an administrator.", uow.money(amount.abs()));
    uow.notify(user_id, message);
    info!(user_id, %amount, "wallet adjusted");
    uow.user(user_id).cloned()
}

impl Ledger {
    pub async fn purchase_plan(&self, user_id: UserId, plan_id: PlanId) -> LedgerResult<User> {
        self.transact(|uow| purchase_plan(uow, user_id, plan_id)).await
    }

    pub async fn adjust_wallet(&self, user_id: UserId, amount: Decimal, reason: Option<String>) -> LedgerResult<User> {
        self.transact(|uow| adjust_wallet(uow, user_id, amount, reason)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::user::UserStatus;
    use crate::ledger::testing::*;

    #[test]
    fn purchase_debits_and_activates() {
        let mut fx = Fixture::new();
        let gold = fx.plan(plan("Gold", 200));
        let alice = fx.user("alice", None);
        fx.fund(alice, 250);
        let mut uow = fx.work();

        let user = purchase_plan(&mut uow, alice, gold).unwrap();
        assert_eq!(user.wallet_balance, dec(50));
        assert!(user.owns_plan("Gold"));
        assert_eq!(count_of(uow.state(), alice, TransactionType::PlanPurchase), 1);
    }

    #[test]
    fn insufficient_funds_leaves_the_user_untouched() {
        let mut fx = Fixture::new();
        let gold = fx.plan(plan("Gold", 200));
        let alice = fx.user("alice", None);
        fx.fund(alice, 150);
        let before = fx.state.users[&alice].clone();
        let mut uow = fx.work();

        let err = purchase_plan(&mut uow, alice, gold).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(uow.state().users[&alice], before);
        assert!(uow.state().transactions.is_empty());
        assert!(uow.state().notifications.is_empty());
    }

    #[test]
    fn repurchase_follows_the_setting() {
        let mut fx = Fixture::new();
        let gold = fx.plan(plan("Gold", 100));
        let alice = fx.user("alice", None);
        fx.fund(alice, 300);
        fx.give_plan(alice, "Gold");

        let mut uow = fx.work();
        purchase_plan(&mut uow, alice, gold).unwrap();
        assert_eq!(wallet(uow.state(), alice), dec(200));

        fx.state.settings.allow_plan_repurchase = false;
        let mut uow = fx.work();
        let err = purchase_plan(&mut uow, alice, gold).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
    }

    #[test]
    fn disabled_plans_and_blocked_users_are_refused() {
        let mut fx = Fixture::new();
        let mut retired = plan("Retired", 10);
        retired.status = PlanStatus::Disabled;
        let retired = fx.plan(retired);
        let open = fx.plan(plan("Open", 10));
        let alice = fx.user("alice", None);
        fx.fund(alice, 100);

        let mut uow = fx.work();
        assert!(matches!(purchase_plan(&mut uow, alice, retired), Err(LedgerError::Validation(_))));
        assert!(matches!(purchase_plan(&mut uow, alice, 42), Err(LedgerError::NotFound { .. })));

        fx.state.users.get_mut(&alice).unwrap().status = UserStatus::Blocked;
        let mut uow = fx.work();
        assert!(matches!(purchase_plan(&mut uow, alice, open), Err(LedgerError::Forbidden(_))));
    }

    #[test]
    fn adjustments_are_signed() {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", None);
        let mut uow = fx.work();

        adjust_wallet(&mut uow, alice, dec(30), None).unwrap();
        let user = adjust_wallet(&mut uow, alice, dec(-50), Some("chargeback".to_string())).unwrap();

        assert_eq!(user.wallet_balance, dec(-20));
        assert_eq!(count_of(uow.state(), alice, TransactionType::ManualCredit), 1);
        let debit = uow.state().transactions.last().unwrap();
        assert_eq!(debit.transaction_type, TransactionType::ManualDebit);
        assert_eq!(debit.amount, dec(-50));
        assert_eq!(debit.description, "chargeback");
        assert!(matches!(
            adjust_wallet(&mut uow, alice, Decimal::ZERO, None),
            Err(LedgerError::Validation(_))
        ));
    }
}
