use tracing::{info, warn};

use crate::db::request::{NewTransfer, StatusUpdate, Transfer, TransferStatus};
use crate::db::tx::{NewTransaction, TransactionStatus, TransactionType};
use crate::db::user::UserId;
use crate::db::utils::generate_id;

use super::deposit::{ensure_not_blocked, ensure_positive};
use super::error::{LedgerError, LedgerResult};
use super::unit::UnitOfWork;
use super::Ledger;

/// Moves the amount out of the sender's wallet into a pending transfer. The
/// recipient is credited only once an admin approves it.
pub fn create_transfer(uow: &mut UnitOfWork, request: NewTransfer) -> LedgerResult<Transfer> {
    if !uow.settings().is_user_transfer_enabled {
        return Err(LedgerError::Forbidden("user transfers are disabled".to_string()));
    }
    ensure_positive(request.amount)?;
    ensure_not_blocked(uow, request.sender_id)?;
    if request.sender_id == request.recipient_id {
        return Err(LedgerError::validation("cannot transfer to yourself"));
    }
    let recipient_name = uow.user(request.recipient_id)?.username.clone();
    uow.ensure_funds(request.sender_id, request.amount)?;

    let transfer = Transfer {
        id: generate_id("trf"),
        sender_id: request.sender_id,
        sender_name: uow.user(request.sender_id)?.username.clone(),
        recipient_id: request.recipient_id,
        recipient_name,
        amount: request.amount,
        status: TransferStatus::Pending,
        admin_notes: None,
        created_at: uow.now(),
        updated_at: uow.now(),
    };

    uow.debit_wallet(transfer.sender_id, transfer.amount)?;
    uow.record_transaction(
        NewTransaction::new(
            transfer.sender_id,
            TransactionType::TransferRequest,
            -transfer.amount,
            TransactionStatus::Pending,
            format!("Transfer request to {}", transfer.recipient_name),
        )
        .related_to(&transfer.id),
    )?;
    uow.state_mut()
        .transfers
        .insert(transfer.id.clone(), transfer.clone());

    let message = format!(
        "Your transfer of {} to {} is awaiting approval.",
        uow.money(transfer.amount),
        transfer.recipient_name
    );
    uow.notify(transfer.sender_id, message);
    info!(transfer = %transfer.id, sender = transfer.sender_id, "transfer requested");
    Ok(transfer)
}

/// Settles a pending transfer. Approved and Rejected transfers are final.
pub fn update_transfer(uow: &mut UnitOfWork, id: &str, update: StatusUpdate<TransferStatus>) -> LedgerResult<Transfer> {
    let mut transfer = uow
        .state()
        .transfers
        .get(id)
        .cloned()
        .ok_or_else(|| LedgerError::not_found("Transfer", id))?;

    let to = update.status;
    if transfer.status != TransferStatus::Pending || to == TransferStatus::Pending {
        return Err(LedgerError::transition("Transfer", transfer.status, to));
    }

    let amount = transfer.amount;
    if to == TransferStatus::Approved {
        uow.credit_wallet(transfer.recipient_id, amount)?;
        uow.record_transaction(
            NewTransaction::new(
                transfer.recipient_id,
                TransactionType::TransferReceived,
                amount,
                TransactionStatus::Approved,
                format!("Transfer from {}", transfer.sender_name),
            )
            .related_to(id)
            .from_user(transfer.sender_id),
        )?;
        let recipient = transfer.recipient_name.clone();
        uow.update_related_transaction(id, TransactionType::TransferRequest, |tx| {
            tx.transaction_type = TransactionType::TransferSent;
            tx.status = TransactionStatus::Approved;
            tx.description = format!("Transfer sent to {recipient}");
        });

        let sent = format!(
            "Your transfer of {} to {} has been approved.",
            uow.money(amount),
            transfer.recipient_name
        );
        uow.notify(transfer.sender_id, sent);
        let received = format!(
            "You have received {} from {}.",
            uow.money(amount),
            transfer.sender_name
        );
        uow.notify(transfer.recipient_id, received);
        info!(transfer = id, "transfer approved");
    } else {
        uow.credit_wallet(transfer.sender_id, amount)?;
        uow.update_related_transaction(id, TransactionType::TransferRequest, |tx| {
            tx.transaction_type = TransactionType::TransferRefund;
            tx.amount = amount;
            tx.status = TransactionStatus::Approved;
            tx.description = "Transfer rejected, amount refunded".to_string();
        });

        let refunded = format!(
            "Your transfer of {} to {} was rejected and refunded.",
            uow.money(amount),
            transfer.recipient_name
        );
        uow.notify(transfer.sender_id, refunded);
        warn!(transfer = id, "transfer rejected and refunded");
    }

    transfer.status = to;
    if update.admin_notes.is_some() {
        transfer.admin_notes = update.admin_notes;
    }
    transfer.updated_at = uow.now();
    uow.state_mut()
        .transfers
        .insert(transfer.id.clone(), transfer.clone());
    Ok(transfer)
}

impl Ledger {
    pub async fn create_transfer(&self, request: NewTransfer) -> LedgerResult<Transfer> {
        self.transact(|uow| create_transfer(uow, request)).await
    }

    pub async fn update_transfer(&self, id: &str, update: StatusUpdate<TransferStatus>) -> LedgerResult<Transfer> {
        self.transact(|uow| update_transfer(uow, id, update)).await
    }

    /// Transfers sent or received by `user_id`, or all of them.
    pub async fn transfers(&self, user_id: Option<UserId>) -> Vec<Transfer> {
        self.read(|state| {
            state
                .transfers
                .values()
                .filter(|t| user_id.map_or(true, |id| t.sender_id == id || t.recipient_id == id))
                .cloned()
                .collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing::*;

    fn request(sender_id: UserId, recipient_id: UserId, amount: i64) -> NewTransfer {
        NewTransfer {
            sender_id,
            recipient_id,
            amount: dec(amount),
        }
    }

    fn status(status: TransferStatus) -> StatusUpdate<TransferStatus> {
        StatusUpdate {
            status,
            admin_notes: Some("checked".to_string()),
        }
    }

    fn pair() -> (Fixture, UserId, UserId) {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", None);
        let bob = fx.user("bob", None);
        fx.fund(alice, 100);
        (fx, alice, bob)
    }

    #[test]
    fn approval_moves_money_to_the_recipient() {
        let (fx, alice, bob) = pair();
        let mut uow = fx.work();
        let transfer = create_transfer(&mut uow, request(alice, bob, 40)).unwrap();
        assert_eq!(wallet(uow.state(), alice), dec(60));
        assert_eq!(wallet(uow.state(), bob), dec(0));

        let approved = update_transfer(&mut uow, &transfer.id, status(TransferStatus::Approved)).unwrap();
        assert_eq!(approved.admin_notes.as_deref(), Some("checked"));
        assert_eq!(wallet(uow.state(), bob), dec(40));
        assert_eq!(count_of(uow.state(), alice, TransactionType::TransferSent), 1);
        assert_eq!(count_of(uow.state(), alice, TransactionType::TransferRequest), 0);
        assert_eq!(count_of(uow.state(), bob, TransactionType::TransferReceived), 1);
    }

    #[test]
    fn rejection_refunds_the_sender() {
        let (fx, alice, bob) = pair();
        let mut uow = fx.work();
        let transfer = create_transfer(&mut uow, request(alice, bob, 40)).unwrap();
        update_transfer(&mut uow, &transfer.id, status(TransferStatus::Rejected)).unwrap();

        assert_eq!(wallet(uow.state(), alice), dec(100));
        assert_eq!(wallet(uow.state(), bob), dec(0));
        let refund = uow
            .state()
            .transactions_for(alice)
            .find(|tx| tx.transaction_type == TransactionType::TransferRefund)
            .unwrap();
        assert_eq!(refund.amount, dec(40));
    }

    #[test]
    fn settled_transfers_are_immutable() {
        let (fx, alice, bob) = pair();
        let mut uow = fx.work();
        let transfer = create_transfer(&mut uow, request(alice, bob, 40)).unwrap();
        update_transfer(&mut uow, &transfer.id, status(TransferStatus::Approved)).unwrap();

        for next in [TransferStatus::Rejected, TransferStatus::Approved, TransferStatus::Pending] {
            let err = update_transfer(&mut uow, &transfer.id, status(next)).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
        }
        assert_eq!(wallet(uow.state(), alice), dec(60));
        assert_eq!(wallet(uow.state(), bob), dec(40));
    }

    #[test]
    fn rejected_transfers_are_immutable() {
        let (fx, alice, bob) = pair();
        let mut uow = fx.work();
        let transfer = create_transfer(&mut uow, request(alice, bob, 40)).unwrap();
        update_transfer(&mut uow, &transfer.id, status(TransferStatus::Rejected)).unwrap();

        for next in [TransferStatus::Approved, TransferStatus::Rejected, TransferStatus::Pending] {
            let err = update_transfer(&mut uow, &transfer.id, status(next)).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
        }
        assert_eq!(wallet(uow.state(), alice), dec(100));
        assert_eq!(wallet(uow.state(), bob), dec(0));

        let related: Vec<_> = uow
            .state()
            .transactions
            .iter()
            .filter(|tx| tx.related_entity_id.as_deref() == Some(transfer.id.as_str()))
            .collect();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].transaction_type, TransactionType::TransferRefund);
        assert_eq!(related[0].amount, dec(40));
    }

    #[test]
    fn guards_run_before_any_mutation() {
        let (mut fx, alice, bob) = pair();
        let mut uow = fx.work();
        assert!(matches!(
            create_transfer(&mut uow, request(alice, bob, 500)),
            Err(LedgerError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            create_transfer(&mut uow, request(alice, alice, 10)),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            create_transfer(&mut uow, request(alice, 99, 10)),
            Err(LedgerError::NotFound { .. })
        ));
        assert_eq!(wallet(uow.state(), alice), dec(100));
        assert!(uow.state().transactions.is_empty());

        fx.state.settings.is_user_transfer_enabled = false;
        let mut uow = fx.work();
        assert!(matches!(
            create_transfer(&mut uow, request(alice, bob, 10)),
            Err(LedgerError::Forbidden(_))
        ));
    }
}
