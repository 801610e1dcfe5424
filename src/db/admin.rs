use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::user::UserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub default_currency_symbol: String,
    pub site_wide_min_withdrawal: Decimal,
    pub is_user_transfer_enabled: bool,
    /// Withdrawals must equal the price of an active plan.
    pub restrict_withdrawal_amount: bool,
    /// Buying a plan the user already owns debits the price again.
    #[serde(default = "enabled")]
    pub allow_plan_repurchase: bool,
}

fn enabled() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_currency_symbol: "$".to_string(),
            site_wide_min_withdrawal: Decimal::TEN,
            is_user_transfer_enabled: true,
            restrict_withdrawal_amount: false,
            allow_plan_repurchase: true,
        }
    }
}

impl Settings {
    pub fn money(&self, amount: Decimal) -> String {
        format!("{}{:.2}", self.default_currency_symbol, amount)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub default_currency_symbol: Option<String>,
    pub site_wide_min_withdrawal: Option<Decimal>,
    pub is_user_transfer_enabled: Option<bool>,
    pub restrict_withdrawal_amount: Option<bool>,
    pub allow_plan_repurchase: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodKind {
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodStatus {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MethodKind,
    #[serde(default)]
    pub account_title: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub instructions: String,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    #[serde(default)]
    pub fee_percent: Decimal,
    pub status: MethodStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodInput {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MethodKind,
    #[serde(default)]
    pub account_title: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub instructions: String,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    #[serde(default)]
    pub fee_percent: Decimal,
    pub status: MethodStatus,
}

impl PaymentMethodInput {
    pub fn into_method(self, id: u64) -> PaymentMethod {
        PaymentMethod {
            id,
            name: self.name,
            kind: self.kind,
            account_title: self.account_title,
            account_number: self.account_number,
            instructions: self.instructions,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            fee_percent: self.fee_percent,
            status: self.status,
        }
    }
}

/// Informational upgrade path shown to members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: u64,
    pub from_plan: String,
    pub to_plan: String,
    pub required_earnings: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleInput {
    pub from_plan: String,
    pub to_plan: String,
    pub required_earnings: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u64,
    pub user_id: UserId,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
