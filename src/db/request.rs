use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    pub id: String,
    pub user_id: UserId,
    pub user_name: String,
    #[serde(default)]
    pub method: String,
    pub amount: Decimal,
    // reference supplied by the payer, e.g. a bank or chain tx id
    #[serde(default)]
    pub transaction_id: String,
    pub status: DepositStatus,
    /// Set when this deposit pays another user's Matching withdrawal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_withdrawal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDeposit {
    pub user_id: UserId,
    pub amount: Decimal,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub transaction_id: String,
    pub matched_withdrawal_id: Option<String>,
    pub user_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    Pending,
    Matching,
    Approved,
    Paid,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub id: String,
    pub user_id: UserId,
    pub user_name: String,
    #[serde(default)]
    pub method: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub final_amount: Decimal,
    #[serde(default)]
    pub account_title: String,
    #[serde(default)]
    pub account_number: String,
    pub status: WithdrawalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_remaining_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWithdrawal {
    pub user_id: UserId,
    pub amount: Decimal,
    #[serde(default)]
    pub method: String,
    /// Only used when no payment method applies a fee.
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default)]
    pub account_title: String,
    #[serde(default)]
    pub account_number: String,
    pub user_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: String,
    pub sender_id: UserId,
    pub sender_name: String,
    pub recipient_id: UserId,
    pub recipient_name: String,
    pub amount: Decimal,
    pub status: TransferStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransfer {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub amount: Decimal,
}

/// Admin patch for any request: the target status plus optional notes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate<S> {
    pub status: S,
    pub admin_notes: Option<String>,
}
