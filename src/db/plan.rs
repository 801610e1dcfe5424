use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::user::User;

pub type PlanId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    #[serde(rename = "type")]
    pub kind: CommissionType,
    pub value: Decimal,
}

impl Commission {
    pub fn percentage(value: Decimal) -> Self {
        Self { kind: CommissionType::Percentage, value }
    }

    pub fn fixed(value: Decimal) -> Self {
        Self { kind: CommissionType::Fixed, value }
    }

    /// Payout for a deposit of `amount`. Fixed commissions ignore the amount.
    pub fn payout(&self, amount: Decimal) -> Decimal {
        match self.kind {
            CommissionType::Percentage => amount * self.value / Decimal::ONE_HUNDRED,
            CommissionType::Fixed => self.value,
        }
    }
}

// Shown to admins only, the engine does not apply these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionDeductions {
    pub after_max_payout: Commission,
    pub after_max_earning: Commission,
    pub after_max_direct: Commission,
}

impl Default for CommissionDeductions {
    fn default() -> Self {
        let zero = Commission::fixed(Decimal::ZERO);
        Self {
            after_max_payout: zero,
            after_max_earning: zero,
            after_max_direct: zero,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoUpgrade {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_plan_id: Option<PlanId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoldPosition {
    pub enabled: bool,
    /// Direct-referral ordinals (1-based) whose commission is escrowed.
    #[serde(default)]
    pub slots: BTreeSet<usize>,
}

impl HoldPosition {
    pub fn holds(&self, ordinal: usize) -> bool {
        self.enabled && self.slots.contains(&ordinal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    Active,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentPlan {
    pub id: PlanId,
    pub name: String,
    pub price: Decimal,
    /// 0 means the plan never expires.
    #[serde(default)]
    pub duration_days: u32,
    #[serde(default)]
    pub min_withdraw: Decimal,
    #[serde(default)]
    pub description: String,
    pub status: PlanStatus,
    /// 0 means unlimited, in which case slot 0 pays every referral.
    #[serde(default)]
    pub direct_referral_limit: u32,
    #[serde(default)]
    pub direct_commissions: Vec<Commission>,
    /// Index 0 is level 2.
    #[serde(default)]
    pub indirect_commissions: Vec<Commission>,
    #[serde(default)]
    pub commission_deductions: CommissionDeductions,
    #[serde(default)]
    pub auto_upgrade: AutoUpgrade,
    #[serde(default)]
    pub hold_position: HoldPosition,
}

impl InvestmentPlan {
    pub fn is_unlimited(&self) -> bool {
        self.direct_referral_limit == 0
    }

    /// Commission for a sponsor at `level` whose direct-referral count is
    /// `referrals`. `None` when the schedule has nothing for that position.
    pub fn commission_for(&self, level: u32, referrals: usize) -> Option<&Commission> {
        match level {
            0 => None,
            1 => {
                if self.is_unlimited() {
                    return self.direct_commissions.first();
                }
                let slot = referrals.checked_sub(1)?;
                self.direct_commissions.get(slot)
            }
            _ => self.indirect_commissions.get(level as usize - 2),
        }
    }
}

/// Fields accepted when creating or replacing a plan.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub duration_days: u32,
    #[serde(default)]
    pub min_withdraw: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default = "active_plan")]
    pub status: PlanStatus,
    #[serde(default)]
    pub direct_referral_limit: u32,
    #[serde(default)]
    pub direct_commissions: Vec<Commission>,
    #[serde(default)]
    pub indirect_commissions: Vec<Commission>,
    #[serde(default)]
    pub commission_deductions: CommissionDeductions,
    #[serde(default)]
    pub auto_upgrade: AutoUpgrade,
    #[serde(default)]
    pub hold_position: HoldPosition,
}

fn active_plan() -> PlanStatus {
    PlanStatus::Active
}

impl PlanInput {
    pub fn into_plan(self, id: PlanId) -> InvestmentPlan {
        InvestmentPlan {
            id,
            name: self.name,
            price: self.price,
            duration_days: self.duration_days,
            min_withdraw: self.min_withdraw,
            description: self.description,
            status: self.status,
            direct_referral_limit: self.direct_referral_limit,
            direct_commissions: self.direct_commissions,
            indirect_commissions: self.indirect_commissions,
            commission_deductions: self.commission_deductions,
            auto_upgrade: self.auto_upgrade,
            hold_position: self.hold_position,
        }
    }
}

/// The plan a user's commissions are computed from: the most expensive of the
/// plans they own. Ties keep the first match in catalog order.
pub fn highest_plan<'a, I>(user: &User, catalog: I) -> Option<&'a InvestmentPlan>
where
    I: IntoIterator<Item = &'a InvestmentPlan>,
{
    catalog
        .into_iter()
        .filter(|plan| user.owns_plan(&plan.name))
        .fold(None, |best: Option<&InvestmentPlan>, plan| match best {
            Some(current) if current.price >= plan.price => Some(current),
            _ => Some(plan),
        })
}
