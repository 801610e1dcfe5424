use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::db::admin::Notification;
use crate::db::state::Sequences;
use crate::db::user::{NewUser, UpdateProfile, User, UserId, UserStatus};

use super::error::{LedgerError, LedgerResult};
use super::unit::UnitOfWork;
use super::Ledger;

/// Adds a member under an existing sponsor. The sponsor link is fixed from
/// here on, so the referral graph can only grow downwards.
pub fn register_user(uow: &mut UnitOfWork, new_user: NewUser) -> LedgerResult<User> {
    let username = new_user.username.trim().to_string();
    if username.is_empty() {
        return Err(LedgerError::validation("username is required"));
    }
    if uow.state().user_by_username(&username).is_some() {
        return Err(LedgerError::validation(format!("username {username} is taken")));
    }
    let sponsor = match new_user.sponsor.map(|s| s.trim().to_string()) {
        Some(sponsor) if !sponsor.is_empty() => {
            if uow.state().user_by_username(&sponsor).is_none() {
                return Err(LedgerError::not_found("User", sponsor));
            }
            Some(sponsor)
        }
        _ => None,
    };

    let id = Sequences::next(&mut uow.state_mut().sequences.user);
    let user = User {
        id,
        username,
        full_name: new_user.full_name,
        email: new_user.email.to_string(),
        phone: new_user.phone,
        whatsapp: new_user.whatsapp,
        country: new_user.country,
        sponsor,
        wallet_balance: Decimal::ZERO,
        held_balance: Decimal::ZERO,
        active_plans: Default::default(),
        status: UserStatus::Active,
        registration_date: uow.now(),
    };
    uow.state_mut().users.insert(id, user.clone());

    let sponsor_id = user
        .sponsor
        .as_deref()
        .and_then(|name| uow.state().user_by_username(name))
        .map(|sponsor| sponsor.id);
    if let Some(sponsor_id) = sponsor_id {
        uow.notify(sponsor_id, format!("{} joined your team.", user.username));
    }
    uow.notify(id, format!("Welcome, {}!", user.full_name));
    info!(user_id = id, username = %user.username, sponsor = ?user.sponsor, "user registered");
    Ok(user)
}

pub fn update_profile(uow: &mut UnitOfWork, user_id: UserId, patch: UpdateProfile) -> LedgerResult<User> {
    let user = uow.user_mut(user_id)?;
    if let Some(full_name) = patch.full_name {
        user.full_name = full_name;
    }
    if let Some(email) = patch.email {
        user.email = email.to_string();
    }
    if let Some(phone) = patch.phone {
        user.phone = phone;
    }
    if patch.whatsapp.is_some() {
        user.whatsapp = patch.whatsapp;
    }
    if patch.country.is_some() {
        user.country = patch.country;
    }
    let user = user.clone();
    info!(user_id, "profile updated");
    Ok(user)
}

/// Active and Pending users become Blocked; Blocked users become Active.
pub fn toggle_status(uow: &mut UnitOfWork, user_id: UserId) -> LedgerResult<User> {
    let user = uow.user_mut(user_id)?;
    user.status = match user.status {
        UserStatus::Blocked => UserStatus::Active,
        UserStatus::Active | UserStatus::Pending => UserStatus::Blocked,
    };
    let user = user.clone();
    let message = match user.status {
        UserStatus::Blocked => "Your account has been blocked.",
        _ => "Your account is active.",
    };
    uow.notify(user_id, message);
    warn!(user_id, status = ?user.status, "user status changed");
    Ok(user)
}

pub fn mark_notifications_read(uow: &mut UnitOfWork, user_id: UserId) -> LedgerResult<usize> {
    uow.user(user_id)?;
    let mut marked = 0;
    for notification in uow
        .state_mut()
        .notifications
        .iter_mut()
        .filter(|n| n.user_id == user_id && !n.read)
    {
        notification.read = true;
        marked += 1;
    }
    Ok(marked)
}

impl Ledger {
    pub async fn register_user(&self, new_user: NewUser) -> LedgerResult<User> {
        self.transact(|uow| register_user(uow, new_user)).await
    }

    pub async fn update_profile(&self, user_id: UserId, patch: UpdateProfile) -> LedgerResult<User> {
        self.transact(|uow| update_profile(uow, user_id, patch)).await
    }

    pub async fn toggle_status(&self, user_id: UserId) -> LedgerResult<User> {
        self.transact(|uow| toggle_status(uow, user_id)).await
    }

    pub async fn mark_notifications_read(&self, user_id: UserId) -> LedgerResult<usize> {
        self.transact(|uow| mark_notifications_read(uow, user_id)).await
    }

    pub async fn user(&self, user_id: UserId) -> LedgerResult<User> {
        self.read(|state| state.user(user_id).cloned())
            .await
            .ok_or_else(|| LedgerError::not_found("User", user_id))
    }

    pub async fn users(&self) -> Vec<User> {
        self.read(|state| state.users.values().cloned().collect()).await
    }

    /// Newest first.
    pub async fn notifications(&self, user_id: UserId) -> Vec<Notification> {
        self.read(|state| state.notifications_for(user_id).rev().cloned().collect())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing::*;

    fn new_user(username: &str, sponsor: Option<&str>) -> NewUser {
        serde_json::from_value(serde_json::json!({
            "username": username,
            "fullName": format!("{username} Doe"),
            "email": format!("{username}@example.com"),
            "phone": "+1000",
            "sponsor": sponsor,
        }))
        .unwrap()
    }

    #[test]
    fn registration_links_to_an_existing_sponsor() {
        let mut fx = Fixture::new();
        let root = fx.user("root", None);
        let mut uow = fx.work();

        let user = register_user(&mut uow, new_user("alice", Some("root"))).unwrap();
        assert_eq!(user.sponsor.as_deref(), Some("root"));
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.wallet_balance, Decimal::ZERO);
        assert!(user.active_plans.is_empty());
        assert_eq!(uow.state().direct_referral_count("root"), 1);
        assert_eq!(uow.state().notifications_for(root).count(), 1);
    }

    #[test]
    fn registration_rejects_unknown_sponsors_and_duplicates() {
        let mut fx = Fixture::new();
        fx.user("root", None);
        let mut uow = fx.work();

        assert!(matches!(
            register_user(&mut uow, new_user("alice", Some("ghost"))),
            Err(LedgerError::NotFound { .. })
        ));
        assert!(matches!(
            register_user(&mut uow, new_user("root", None)),
            Err(LedgerError::Validation(_))
        ));
        assert_eq!(uow.state().users.len(), 1);
    }

    #[test]
    fn invalid_emails_fail_to_parse() {
        let parsed: Result<NewUser, _> = serde_json::from_value(serde_json::json!({
            "username": "bob",
            "fullName": "Bob",
            "email": "not-an-email",
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn profile_updates_leave_ledger_fields_alone() {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", Some("root"));
        fx.fund(alice, 40);
        let mut uow = fx.work();

        let patch: UpdateProfile = serde_json::from_value(serde_json::json!({
            "fullName": "Alice Liddell",
            "country": "UK",
        }))
        .unwrap();
        let user = update_profile(&mut uow, alice, patch).unwrap();
        assert_eq!(user.full_name, "Alice Liddell");
        assert_eq!(user.country.as_deref(), Some("UK"));
        assert_eq!(user.sponsor.as_deref(), Some("root"));
        assert_eq!(user.wallet_balance, dec(40));
    }

    #[test]
    fn toggling_blocks_and_unblocks() {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", None);
        let mut uow = fx.work();

        assert_eq!(toggle_status(&mut uow, alice).unwrap().status, UserStatus::Blocked);
        assert_eq!(toggle_status(&mut uow, alice).unwrap().status, UserStatus::Active);
    }

    #[tokio::test]
    async fn notifications_come_back_newest_first() {
        let mut fx = Fixture::new();
        let root = fx.user("root", None);
        let ledger = fx.ledger();
        ledger.register_user(new_user("alice", Some("root"))).await.unwrap();
        ledger.register_user(new_user("bob", Some("root"))).await.unwrap();

        let messages: Vec<String> = ledger
            .notifications(root)
            .await
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(messages, vec!["bob joined your team.", "alice joined your team."]);
    }

    #[tokio::test]
    async fn notifications_are_marked_read_per_user() {
        let mut fx = Fixture::new();
        let root = fx.user("root", None);
        let ledger = fx.ledger();
        let alice = ledger.register_user(new_user("alice", Some("root"))).await.unwrap();

        assert_eq!(ledger.mark_notifications_read(root).await.unwrap(), 1);
        assert_eq!(ledger.mark_notifications_read(root).await.unwrap(), 0);
        let unread = ledger
            .notifications(alice.id)
            .await
            .into_iter()
            .filter(|n| !n.read)
            .count();
        assert_eq!(unread, 1);
    }
}
