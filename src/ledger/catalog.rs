use rust_decimal::Decimal;
use tracing::info;

use crate::db::admin::{PaymentMethod, PaymentMethodInput, Rule, RuleInput, Settings, SettingsPatch};
use crate::db::plan::{InvestmentPlan, PlanId, PlanInput};
use crate::db::state::Sequences;

use super::error::{LedgerError, LedgerResult};
use super::unit::UnitOfWork;
use super::Ledger;

fn check_plan(uow: &UnitOfWork, input: &PlanInput, id: Option<PlanId>) -> LedgerResult<()> {
    if input.name.trim().is_empty() {
        return Err(LedgerError::validation("plan name is required"));
    }
    if input.price <= Decimal::ZERO {
        return Err(LedgerError::validation("plan price must be positive"));
    }
    let taken = uow
        .state()
        .investment_plans
        .values()
        .any(|plan| plan.name == input.name && Some(plan.id) != id);
    if taken {
        return Err(LedgerError::validation(format!("plan {} already exists", input.name)));
    }
    if let Some(target) = input.auto_upgrade.to_plan_id.filter(|_| input.auto_upgrade.enabled) {
        if uow.state().plan(target).is_none() {
            return Err(LedgerError::not_found("InvestmentPlan", target));
        }
    }
    Ok(())
}

pub fn create_plan(uow: &mut UnitOfWork, input: PlanInput) -> LedgerResult<InvestmentPlan> {
    check_plan(uow, &input, None)?;
    let id = Sequences::next(&mut uow.state_mut().sequences.plan);
    let plan = input.into_plan(id);
    uow.state_mut().investment_plans.insert(id, plan.clone());
    info!(plan = %plan.name, id, "plan created");
    Ok(plan)
}

/// Replaces a plan. A rename carries over to every member who owns it.
pub fn update_plan(uow: &mut UnitOfWork, id: PlanId, input: PlanInput) -> LedgerResult<InvestmentPlan> {
    let previous = uow
        .state()
        .plan(id)
        .map(|plan| plan.name.clone())
        .ok_or_else(|| LedgerError::not_found("InvestmentPlan", id))?;
    check_plan(uow, &input, Some(id))?;

    let plan = input.into_plan(id);
    if plan.name != previous {
        for user in uow.state_mut().users.values_mut() {
            if user.active_plans.remove(&previous) {
                user.active_plans.insert(plan.name.clone());
            }
        }
    }
    uow.state_mut().investment_plans.insert(id, plan.clone());
    info!(plan = %plan.name, id, "plan updated");
    Ok(plan)
}

pub fn delete_plan(uow: &mut UnitOfWork, id: PlanId) -> LedgerResult<InvestmentPlan> {
    let plan = uow
        .state_mut()
        .investment_plans
        .remove(&id)
        .ok_or_else(|| LedgerError::not_found("InvestmentPlan", id))?;
    info!(plan = %plan.name, id, "plan deleted");
    Ok(plan)
}

fn check_method(input: &PaymentMethodInput) -> LedgerResult<()> {
    if input.name.trim().is_empty() {
        return Err(LedgerError::validation("payment method name is required"));
    }
    if input.min_amount < Decimal::ZERO || input.max_amount < input.min_amount {
        return Err(LedgerError::validation("invalid amount range"));
    }
    if input.fee_percent < Decimal::ZERO || input.fee_percent > Decimal::ONE_HUNDRED {
        return Err(LedgerError::validation("fee percent must be between 0 and 100"));
    }
    Ok(())
}

pub fn create_payment_method(uow: &mut UnitOfWork, input: PaymentMethodInput) -> LedgerResult<PaymentMethod> {
    check_method(&input)?;
    let id = Sequences::next(&mut uow.state_mut().sequences.payment_method);
    let method = input.into_method(id);
    uow.state_mut().payment_methods.insert(id, method.clone());
    info!(method = %method.name, id, "payment method created");
    Ok(method)
}

pub fn update_payment_method(uow: &mut UnitOfWork, id: u64, input: PaymentMethodInput) -> LedgerResult<PaymentMethod> {
    check_method(&input)?;
    let slot = uow
        .state_mut()
        .payment_methods
        .get_mut(&id)
        .ok_or_else(|| LedgerError::not_found("PaymentMethod", id))?;
    *slot = input.into_method(id);
    Ok(slot.clone())
}

pub fn delete_payment_method(uow: &mut UnitOfWork, id: u64) -> LedgerResult<PaymentMethod> {
    uow.state_mut()
        .payment_methods
        .remove(&id)
        .ok_or_else(|| LedgerError::not_found("PaymentMethod", id))
}

pub fn create_rule(uow: &mut UnitOfWork, input: RuleInput) -> LedgerResult<Rule> {
    if input.required_earnings < Decimal::ZERO {
        return Err(LedgerError::validation("required earnings cannot be negative"));
    }
    let id = Sequences::next(&mut uow.state_mut().sequences.rule);
    let rule = Rule {
        id,
        from_plan: input.from_plan,
        to_plan: input.to_plan,
        required_earnings: input.required_earnings,
    };
    uow.state_mut().rules.insert(id, rule.clone());
    Ok(rule)
}

pub fn delete_rule(uow: &mut UnitOfWork, id: u64) -> LedgerResult<Rule> {
    uow.state_mut()
        .rules
        .remove(&id)
        .ok_or_else(|| LedgerError::not_found("Rule", id))
}

pub fn update_settings(uow: &mut UnitOfWork, patch: SettingsPatch) -> LedgerResult<Settings> {
    if patch
        .site_wide_min_withdrawal
        .is_some_and(|min| min < Decimal::ZERO)
    {
        return Err(LedgerError::validation("minimum withdrawal cannot be negative"));
    }
    let settings = &mut uow.state_mut().settings;
    if let Some(symbol) = patch.default_currency_symbol {
        settings.default_currency_symbol = symbol;
    }
    if let Some(min) = patch.site_wide_min_withdrawal {
        settings.site_wide_min_withdrawal = min;
    }
    if let Some(enabled) = patch.is_user_transfer_enabled {
        settings.is_user_transfer_enabled = enabled;
    }
    if let Some(restrict) = patch.restrict_withdrawal_amount {
        settings.restrict_withdrawal_amount = restrict;
    }
    if let Some(allow) = patch.allow_plan_repurchase {
        settings.allow_plan_repurchase = allow;
    }
    let settings = settings.clone();
    info!(?settings, "settings updated");
    Ok(settings)
}

impl Ledger {
    pub async fn create_plan(&self, input: PlanInput) -> LedgerResult<InvestmentPlan> {
        self.transact(|uow| create_plan(uow, input)).await
    }

    pub async fn update_plan(&self, id: PlanId, input: PlanInput) -> LedgerResult<InvestmentPlan> {
        self.transact(|uow| update_plan(uow, id, input)).await
    }

    pub async fn delete_plan(&self, id: PlanId) -> LedgerResult<InvestmentPlan> {
        self.transact(|uow| delete_plan(uow, id)).await
    }

    pub async fn plans(&self) -> Vec<InvestmentPlan> {
        self.read(|state| state.investment_plans.values().cloned().collect())
            .await
    }

    pub async fn create_payment_method(&self, input: PaymentMethodInput) -> LedgerResult<PaymentMethod> {
        self.transact(|uow| create_payment_method(uow, input)).await
    }

    pub async fn update_payment_method(&self, id: u64, input: PaymentMethodInput) -> LedgerResult<PaymentMethod> {
        self.transact(|uow| update_payment_method(uow, id, input)).await
    }

    pub async fn delete_payment_method(&self, id: u64) -> LedgerResult<PaymentMethod> {
        self.transact(|uow| delete_payment_method(uow, id)).await
    }

    pub async fn payment_methods(&self) -> Vec<PaymentMethod> {
        self.read(|state| state.payment_methods.values().cloned().collect())
            .await
    }

    pub async fn create_rule(&self, input: RuleInput) -> LedgerResult<Rule> {
        self.transact(|uow| create_rule(uow, input)).await
    }

    pub async fn delete_rule(&self, id: u64) -> LedgerResult<Rule> {
        self.transact(|uow| delete_rule(uow, id)).await
    }

    pub async fn rules(&self) -> Vec<Rule> {
        self.read(|state| state.rules.values().cloned().collect()).await
    }

    pub async fn settings(&self) -> Settings {
        self.read(|state| state.settings.clone()).await
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> LedgerResult<Settings> {
        self.transact(|uow| update_settings(uow, patch)).await
    }
}
