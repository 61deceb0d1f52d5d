//! Device registration and the notification outbox.

use crate::error::NotifyResult;
use crate::NotifyError;
use onestop_storage::{PlatformStore, QueryWindow};
use onestop_types::{DevicePlatform, DeviceToken, Notification, UserAccount, UserId};
use std::sync::Arc;

/// Notification service over a platform store
pub struct NotifyService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: PlatformStore + ?Sized> NotifyService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Register or refresh a push token for the caller's device.
    ///
    /// Upserts by (user, token), so re-registering after an app restart
    /// is a no-op.
    pub async fn register_device(
        &self,
        actor: &UserAccount,
        token: &str,
        platform: DevicePlatform,
    ) -> NotifyResult<DeviceToken> {
        let token = token.trim();
        if token.is_empty() {
            return Err(NotifyError::InvalidInput(
                "device token must not be empty".to_string(),
            ));
        }
        let device = DeviceToken::new(actor.id.clone(), token, platform);
        self.store.upsert_device_token(device.clone()).await?;
        tracing::debug!(user_id = %actor.id, platform = platform.as_str(), "device registered");
        Ok(device)
    }

    /// Queue a push notification for delivery by the dispatcher.
    pub async fn notify(
        &self,
        user: &UserId,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> NotifyResult<Notification> {
        let notification = Notification::new(user.clone(), title, body).with_data(data);
        self.store.enqueue_notification(notification.clone()).await?;
        Ok(notification)
    }

    /// The caller's notification feed, newest first.
    pub async fn notifications_for(
        &self,
        actor: &UserAccount,
        window: QueryWindow,
    ) -> NotifyResult<Vec<Notification>> {
        Ok(self
            .store
            .list_notifications_for_user(&actor.id, window)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onestop_storage::memory::InMemoryStore;
    use onestop_storage::NotifyStore;
    use onestop_types::NotificationStatus;

    fn user() -> UserAccount {
        UserAccount::new(
            "Aisyah Rahman",
            "aisyah@example.com",
            "+60123456789",
            "901231105678",
        )
    }

    #[tokio::test]
    async fn test_register_device_is_an_upsert() {
        let store = Arc::new(InMemoryStore::new());
        let svc = NotifyService::new(store.clone());
        let user = user();

        svc.register_device(&user, "fcm-token-1", DevicePlatform::Android)
            .await
            .unwrap();
        svc.register_device(&user, "fcm-token-1", DevicePlatform::Android)
            .await
            .unwrap();
        svc.register_device(&user, "fcm-token-2", DevicePlatform::Web)
            .await
            .unwrap();

        let tokens = store.list_device_tokens(&user.id).await.unwrap();
        assert_eq!(tokens.len(), 2);
    }

    #[tokio::test]
    async fn test_notify_enqueues_for_the_dispatcher() {
        let store = Arc::new(InMemoryStore::new());
        let svc = NotifyService::new(store.clone());
        let user = user();

        let note = svc
            .notify(
                &user.id,
                "Document verified",
                "Your site plan was accepted",
                serde_json::json!({ "document_id": "doc-1" }),
            )
            .await
            .unwrap();
        assert_eq!(note.status, NotificationStatus::Queued);

        let feed = svc
            .notifications_for(&user, QueryWindow::default())
            .await
            .unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].title, "Document verified");
    }

    #[tokio::test]
    async fn test_blank_device_token_is_refused() {
        let store = Arc::new(InMemoryStore::new());
        let svc = NotifyService::new(store);

        let result = svc
            .register_device(&user(), "   ", DevicePlatform::Ios)
            .await;
        assert!(matches!(result, Err(NotifyError::InvalidInput(_))));
    }
}
