use tokio::sync::broadcast;

use crate::db::admin::Notification;

/// Delivery of committed notifications to whatever transport sits outside the
/// ledger. Implementations must not block; errors are theirs to swallow.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Fans committed notifications out to live subscribers (the SSE stream).
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&self, notification: &Notification) {
        tracing::debug!(
            user_id = notification.user_id,
            "notification: {}",
            notification.message
        );
        // no subscribers is fine
        let _ = self.sender.send(notification.clone());
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_and_missing_subscribers_are_ignored() {
        let sink = BroadcastSink::new(8);
        let notification = Notification {
            id: 1,
            user_id: 3,
            message: "Your deposit has been approved.".to_string(),
            read: false,
            created_at: Utc::now(),
        };
        sink.notify(&notification);

        let mut rx = sink.subscribe();
        sink.notify(&notification);
        assert_eq!(rx.recv().await.unwrap(), notification);
    }
}
