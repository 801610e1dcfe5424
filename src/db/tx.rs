use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub user_name: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    // signed: negative for money leaving the user
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    /// Deposit, withdrawal, transfer or plan this entry belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_entity_id: Option<String>,
    /// Depositor whose deposit generated a commission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    #[serde(rename = "Withdrawal Request")]
    WithdrawalRequest,
    #[serde(rename = "Withdrawal Refund")]
    WithdrawalRefund,
    Commission,
    #[serde(rename = "Held Commission")]
    HeldCommission,
    #[serde(rename = "Manual Credit")]
    ManualCredit,
    #[serde(rename = "Manual Debit")]
    ManualDebit,
    #[serde(rename = "Plan Purchase")]
    PlanPurchase,
    #[serde(rename = "Plan Upgrade")]
    PlanUpgrade,
    #[serde(rename = "Transfer Request")]
    TransferRequest,
    #[serde(rename = "Transfer Sent")]
    TransferSent,
    #[serde(rename = "Transfer Received")]
    TransferReceived,
    #[serde(rename = "Transfer Refund")]
    TransferRefund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
}

/// Entry about to be appended; the unit of work assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub description: String,
    pub level: Option<u32>,
    pub related_entity_id: Option<String>,
    pub source_user_id: Option<UserId>,
}

impl NewTransaction {
    pub fn new(
        user_id: UserId,
        transaction_type: TransactionType,
        amount: Decimal,
        status: TransactionStatus,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            transaction_type,
            amount,
            status,
            description: description.into(),
            level: None,
            related_entity_id: None,
            source_user_id: None,
        }
    }

    pub fn related_to(mut self, entity_id: impl Into<String>) -> Self {
        self.related_entity_id = Some(entity_id.into());
        self
    }

    pub fn at_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn from_user(mut self, user_id: UserId) -> Self {
        self.source_user_id = Some(user_id);
        self
    }
}
