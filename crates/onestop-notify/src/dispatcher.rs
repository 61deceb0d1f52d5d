//! Background delivery loop for the notification outbox.

use crate::error::NotifyResult;
use crate::senders::PushSender;
use futures::future::join_all;
use onestop_storage::{PlatformStore, QueryWindow};
use onestop_types::Notification;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

/// Tuning for the dispatcher loop
#[derive(Clone, Copy, Debug)]
pub struct DispatcherConfig {
    /// Seconds between drain passes
    pub poll_interval_secs: u64,
    /// Queued rows loaded per pass
    pub batch_size: usize,
    /// Delivery attempts before a notification is marked failed
    pub max_attempts: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            batch_size: 32,
            max_attempts: 3,
        }
    }
}

impl DispatcherConfig {
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Drains the queued outbox and pushes to registered devices.
pub struct NotificationDispatcher<S: ?Sized, P: ?Sized> {
    store: Arc<S>,
    sender: Arc<P>,
    config: DispatcherConfig,
}

impl<S: PlatformStore + ?Sized, P: PushSender + ?Sized> NotificationDispatcher<S, P> {
    pub fn new(store: Arc<S>, sender: Arc<P>) -> Self {
        Self {
            store,
            sender,
            config: DispatcherConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Run drain passes until the shutdown flag flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(self.config.poll_interval_secs));
        tracing::info!(
            poll_interval_secs = self.config.poll_interval_secs,
            "notification dispatcher started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.drain_once().await {
                        tracing::error!(error = %e, "notification drain failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("notification dispatcher stopped");
    }

    /// One pass over the queued window. Returns how many were delivered.
    pub async fn drain_once(&self) -> NotifyResult<usize> {
        let queued = self
            .store
            .list_queued_notifications(QueryWindow {
                limit: self.config.batch_size,
                offset: 0,
            })
            .await?;
        if queued.is_empty() {
            return Ok(0);
        }

        let results = join_all(
            queued
                .into_iter()
                .map(|notification| self.deliver(notification)),
        )
        .await;

        let mut sent = 0;
        for result in results {
            match result {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "notification delivery errored"),
            }
        }
        Ok(sent)
    }

    /// Push one notification to every device of its recipient.
    ///
    /// No registered device means nothing to retry: the notification is
    /// failed immediately. A send failure re-queues until `max_attempts`.
    async fn deliver(&self, mut notification: Notification) -> NotifyResult<bool> {
        let tokens = self.store.list_device_tokens(&notification.user_id).await?;
        if tokens.is_empty() {
            notification.mark_failed();
            self.store.update_notification(notification.clone()).await?;
            tracing::debug!(
                notification_id = %notification.id,
                user_id = %notification.user_id,
                "recipient has no registered devices"
            );
            return Ok(false);
        }

        let mut delivered = false;
        for token in &tokens {
            match self
                .sender
                .send(
                    &token.token,
                    &notification.title,
                    &notification.body,
                    &notification.data,
                )
                .await
            {
                Ok(()) => delivered = true,
                Err(e) => {
                    tracing::warn!(
                        notification_id = %notification.id,
                        platform = token.platform.as_str(),
                        error = %e,
                        "push send failed"
                    );
                }
            }
        }

        if delivered {
            notification.mark_sent();
        } else {
            notification.record_attempt();
            if notification.attempts >= self.config.max_attempts {
                notification.mark_failed();
            }
        }
        self.store.update_notification(notification).await?;
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::senders::CaptureSender;
    use onestop_storage::memory::InMemoryStore;
    use onestop_storage::NotifyStore;
    use onestop_types::{DevicePlatform, DeviceToken, NotificationStatus, UserAccount, UserId};

    fn user() -> UserAccount {
        UserAccount::new(
            "Aisyah Rahman",
            "aisyah@example.com",
            "+60123456789",
            "901231105678",
        )
    }

    async fn queued_for(store: &Arc<InMemoryStore>, user: &UserId) -> Vec<Notification> {
        store
            .list_notifications_for_user(user, QueryWindow::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_drain_delivers_to_registered_devices() {
        let store = Arc::new(InMemoryStore::new());
        let sender = Arc::new(CaptureSender::new());
        let dispatcher = NotificationDispatcher::new(store.clone(), sender.clone());
        let user = user();

        store
            .upsert_device_token(DeviceToken::new(
                user.id.clone(),
                "fcm-token-1",
                DevicePlatform::Android,
            ))
            .await
            .unwrap();
        store
            .enqueue_notification(Notification::new(
                user.id.clone(),
                "Application update",
                "Warehouse extension advanced to stage final",
            ))
            .await
            .unwrap();

        let sent = dispatcher.drain_once().await.unwrap();
        assert_eq!(sent, 1);

        let rows = queued_for(&store, &user.id).await;
        assert_eq!(rows[0].status, NotificationStatus::Sent);
        assert!(rows[0].sent_at.is_some());

        let pushes = sender.pushes().await;
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].token, "fcm-token-1");
        assert_eq!(pushes[0].title, "Application update");

        // Nothing left in the queue.
        assert_eq!(dispatcher.drain_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_no_devices_fails_immediately() {
        let store = Arc::new(InMemoryStore::new());
        let sender = Arc::new(CaptureSender::new());
        let dispatcher = NotificationDispatcher::new(store.clone(), sender.clone());
        let user = user();

        store
            .enqueue_notification(Notification::new(user.id.clone(), "t", "b"))
            .await
            .unwrap();

        assert_eq!(dispatcher.drain_once().await.unwrap(), 0);
        let rows = queued_for(&store, &user.id).await;
        assert_eq!(rows[0].status, NotificationStatus::Failed);
        assert_eq!(rows[0].attempts, 0);
        assert!(sender.pushes().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_failures_retry_then_give_up() {
        let store = Arc::new(InMemoryStore::new());
        let sender = Arc::new(CaptureSender::new());
        let dispatcher = NotificationDispatcher::new(store.clone(), sender.clone())
            .with_config(DispatcherConfig::default().with_max_attempts(2));
        let user = user();

        store
            .upsert_device_token(DeviceToken::new(
                user.id.clone(),
                "fcm-token-1",
                DevicePlatform::Android,
            ))
            .await
            .unwrap();
        store
            .enqueue_notification(Notification::new(user.id.clone(), "t", "b"))
            .await
            .unwrap();
        sender.set_failing(true).await;

        assert_eq!(dispatcher.drain_once().await.unwrap(), 0);
        let rows = queued_for(&store, &user.id).await;
        assert_eq!(rows[0].status, NotificationStatus::Queued);
        assert_eq!(rows[0].attempts, 1);

        assert_eq!(dispatcher.drain_once().await.unwrap(), 0);
        let rows = queued_for(&store, &user.id).await;
        assert_eq!(rows[0].status, NotificationStatus::Failed);
        assert_eq!(rows[0].attempts, 2);

        // A failed row is out of the queue even after the sender recovers.
        sender.set_failing(false).await;
        assert_eq!(dispatcher.drain_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(InMemoryStore::new());
        let sender = Arc::new(CaptureSender::new());
        let dispatcher = NotificationDispatcher::new(store, sender)
            .with_config(DispatcherConfig::default().with_poll_interval_secs(3600));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(dispatcher.run(shutdown_rx));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
