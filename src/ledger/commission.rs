//! Sponsor-chain commission distribution.
//!
//! When a deposit is approved, the depositor's sponsor chain is walked upward.
//! Each ancestor is paid from the schedule of the most expensive plan they
//! own: direct commissions are slot-indexed by the sponsor's current number of
//! direct referrals, indirect commissions are indexed by depth. Held slots are
//! escrowed into the held balance, which can pay for an automatic upgrade.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::db::plan::{highest_plan, Commission, InvestmentPlan};
use crate::db::request::{Deposit, WithdrawalStatus};
use crate::db::state::LedgerState;
use crate::db::tx::{NewTransaction, TransactionStatus, TransactionType};
use crate::db::user::{User, UserId};

use super::error::LedgerResult;
use super::unit::UnitOfWork;

/// Deepest level that can earn from a single deposit. Also bounds walks over
/// a corrupted, cyclic sponsor graph.
pub const MAX_COMMISSION_DEPTH: u32 = 10;

/// One resolved ancestor in the sponsor chain.
#[derive(Debug, Clone)]
pub struct ChainStep<'a> {
    pub level: u32,
    pub sponsor: &'a User,
    pub plan: &'a InvestmentPlan,
    /// Direct referrals the sponsor has right now.
    pub referrals: usize,
    pub commission: Option<Commission>,
}

impl ChainStep<'_> {
    /// Held slots are direct-referral ordinals, so only direct commissions
    /// can be escrowed.
    pub fn is_held(&self) -> bool {
        self.level == 1 && self.plan.hold_position.holds(self.referrals)
    }
}

/// Resolves the sponsor named `username` at `level`. `None` ends the walk:
/// the sponsor does not exist or owns no plan.
pub fn resolve_step<'a>(state: &'a LedgerState, username: &str, level: u32) -> Option<ChainStep<'a>> {
    let Some(sponsor) = state.user_by_username(username) else {
        debug!(level, "sponsor {username} not found, chain ends");
        return None;
    };
    let Some(plan) = highest_plan(sponsor, state.investment_plans.values()) else {
        debug!(level, "sponsor {username} has no active plan, chain ends");
        return None;
    };
    let referrals = state.direct_referral_count(&sponsor.username);
    let commission = plan
        .commission_for(level, referrals)
        .copied()
        .filter(|commission| commission.value > Decimal::ZERO);

    Some(ChainStep {
        level,
        sponsor,
        plan,
        referrals,
        commission,
    })
}

/// What happened to one ancestor's commission.
#[derive(Debug, Clone, PartialEq)]
pub struct Payout {
    pub user_id: UserId,
    pub level: u32,
    pub amount: Decimal,
    pub held: bool,
    pub upgraded_to: Option<String>,
}

/// The deposit a commission is paid out of, and who made it.
struct Source<'a> {
    deposit: &'a Deposit,
    depositor_id: UserId,
    depositor_name: String,
}

/// Pays commissions for an approved deposit up the depositor's sponsor chain.
pub fn distribute(uow: &mut UnitOfWork, deposit: &Deposit) -> LedgerResult<Vec<Payout>> {
    let depositor = uow.user(deposit.user_id)?;
    let mut current = depositor.sponsor.clone();
    let source = Source {
        deposit,
        depositor_id: depositor.id,
        depositor_name: depositor.username.clone(),
    };
    let mut payouts = Vec::new();
    let mut level = 1;

    while let Some(username) = current.take() {
        if level > MAX_COMMISSION_DEPTH {
            debug!(deposit = %deposit.id, "commission depth cap reached");
            break;
        }
        let Some(step) = resolve_step(uow.state(), &username, level) else {
            break;
        };
        let sponsor_id = step.sponsor.id;
        let next = step.sponsor.sponsor.clone();
        let held = step.is_held();
        let upgrade_target = step.plan.auto_upgrade.clone();
        let commission = step.commission;

        if let Some(commission) = commission {
            let amount = commission.payout(deposit.amount);
            let payout = if held {
                let upgrade_plan_id = upgrade_target.enabled.then_some(upgrade_target.to_plan_id).flatten();
                let upgraded_to = hold_commission(uow, sponsor_id, level, amount, &source, upgrade_plan_id)?;
                Payout { user_id: sponsor_id, level, amount, held, upgraded_to }
            } else {
                pay_commission(uow, sponsor_id, level, amount, &source)?;
                Payout { user_id: sponsor_id, level, amount, held, upgraded_to: None }
            };
            payouts.push(payout);
        }

        current = next;
        level += 1;
    }

    info!(
        deposit = %deposit.id,
        payouts = payouts.len(),
        "commissions distributed"
    );
    Ok(payouts)
}

fn pay_commission(
    uow: &mut UnitOfWork,
    sponsor_id: UserId,
    level: u32,
    amount: Decimal,
    source: &Source,
) -> LedgerResult<()> {
    let Source { deposit, depositor_id, depositor_name } = source;
    uow.credit_wallet(sponsor_id, amount)?;
    uow.record_transaction(
        NewTransaction::new(
            sponsor_id,
            TransactionType::Commission,
            amount,
            TransactionStatus::Approved,
            format!("From {depositor_name} (Deposit #{})", deposit.id),
        )
        .at_level(level)
        .related_to(&deposit.id)
        .from_user(*depositor_id),
    )?;
    let message = format!(
        "You have received a Level {level} commission of {} from {depositor_name}.",
        uow.money(amount)
    );
    uow.notify(sponsor_id, message);
    Ok(())
}

fn hold_commission(
    uow: &mut UnitOfWork,
    sponsor_id: UserId,
    level: u32,
    amount: Decimal,
    source: &Source,
    upgrade_plan_id: Option<u64>,
) -> LedgerResult<Option<String>> {
    let Source { deposit, depositor_id, depositor_name } = source;
    let held_balance = uow.credit_held(sponsor_id, amount)?;
    uow.record_transaction(
        NewTransaction::new(
            sponsor_id,
            TransactionType::HeldCommission,
            amount,
            TransactionStatus::Approved,
            format!("Held from {depositor_name} (Deposit #{})", deposit.id),
        )
        .at_level(level)
        .related_to(&deposit.id)
        .from_user(*depositor_id),
    )?;
    let message = format!(
        "A commission of {} from {depositor_name} has been held toward your next upgrade.",
        uow.money(amount)
    );
    uow.notify(sponsor_id, message);

    let Some(plan_id) = upgrade_plan_id else {
        return Ok(None);
    };
    let Some(target) = uow.state().plan(plan_id).cloned() else {
        warn!(plan_id, "auto-upgrade target plan not found");
        return Ok(None);
    };
    if held_balance < target.price {
        return Ok(None);
    }

    uow.debit_held(sponsor_id, target.price)?;
    uow.user_mut(sponsor_id)?.active_plans.insert(target.name.clone());
    uow.record_transaction(
        NewTransaction::new(
            sponsor_id,
            TransactionType::PlanUpgrade,
            -target.price,
            TransactionStatus::Approved,
            format!("Auto-upgraded to {}", target.name),
        )
        .related_to(target.id.to_string()),
    )?;
    let message = format!(
        "Your held balance has upgraded you to {} for {}.",
        target.name,
        uow.money(target.price)
    );
    uow.notify(sponsor_id, message);
    info!(user_id = sponsor_id, plan = %target.name, "auto-upgrade applied");
    Ok(Some(target.name))
}

/// Applies an approved deposit that pays another user's Matching withdrawal.
/// No commission is generated for such deposits.
pub fn settle_matched_withdrawal(uow: &mut UnitOfWork, deposit: &Deposit, withdrawal_id: &str) -> LedgerResult<()> {
    let now = uow.now();
    let Some(withdrawal) = uow.state_mut().withdrawals.get_mut(withdrawal_id) else {
        warn!(deposit = %deposit.id, "matched withdrawal {withdrawal_id} not found, skipping");
        return Ok(());
    };
    if withdrawal.status != WithdrawalStatus::Matching {
        warn!(
            deposit = %deposit.id,
            status = ?withdrawal.status,
            "matched withdrawal {withdrawal_id} is not matching, skipping"
        );
        return Ok(());
    }

    let remaining = withdrawal
        .match_remaining_amount
        .unwrap_or(withdrawal.final_amount);
    let remaining = (remaining - deposit.amount).max(Decimal::ZERO);
    withdrawal.match_remaining_amount = Some(remaining);
    withdrawal.updated_at = now;
    debug!(withdrawal = withdrawal_id, %remaining, "matched deposit applied");

    if !remaining.is_zero() {
        return Ok(());
    }

    withdrawal.status = WithdrawalStatus::Paid;
    let owner = withdrawal.user_id;
    let final_amount = withdrawal.final_amount;
    let requested = withdrawal.amount;

    uow.record_transaction(
        NewTransaction::new(
            owner,
            TransactionType::Withdrawal,
            -final_amount,
            TransactionStatus::Approved,
            format!("Withdrawal #{withdrawal_id} paid via matched deposits"),
        )
        .related_to(withdrawal_id),
    )?;
    uow.update_related_transaction(withdrawal_id, TransactionType::WithdrawalRequest, |tx| {
        tx.status = TransactionStatus::Approved;
    });
    let message = format!(
        "Your withdrawal request #{withdrawal_id} for {} has been paid.",
        uow.money(requested)
    );
    uow.notify(owner, message);
    info!(withdrawal = withdrawal_id, "withdrawal paid through matching");
    Ok(())
}
