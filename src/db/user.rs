use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type UserId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    Active,
    Blocked,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    // username of the referrer, fixed at registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<String>,
    pub wallet_balance: Decimal,
    pub held_balance: Decimal,
    #[serde(default)]
    pub active_plans: BTreeSet<String>,
    pub status: UserStatus,
    pub registration_date: DateTime<Utc>,
}

impl User {
    pub fn is_blocked(&self) -> bool {
        self.status == UserStatus::Blocked
    }

    pub fn owns_plan(&self, name: &str) -> bool {
        self.active_plans.contains(name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub email: serde_email::Email,
    #[serde(default)]
    pub phone: String,
    pub whatsapp: Option<String>,
    pub country: Option<String>,
    pub sponsor: Option<String>,
}

/// Profile fields a user or admin may edit. Balances, plans and the sponsor
/// link are owned by the ledger and never change through this path.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    pub full_name: Option<String>,
    pub email: Option<serde_email::Email>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub country: Option<String>,
}
