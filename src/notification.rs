use std::time::{Duration, Instant};

use crate::catalog::CategoryDraft;
use crate::data::RecordId;
use crate::host::DocumentRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Operation a recoverable failure can be retried with
#[derive(Debug, Clone, PartialEq)]
pub enum RetryAction {
    ReopenDocument(DocumentRef),
    RerenderPage,
    DeleteRegion(RecordId),
    AssignCategory(RecordId),
    SaveCategory {
        id: Option<RecordId>,
        draft: CategoryDraft,
    },
    Reinitialize,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub retry: Option<RetryAction>,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel, duration: Duration) -> Self {
        let now = Instant::now();
        Self {
            message: message.into(),
            level,
            created_at: now,
            expires_at: now + duration,
            retry: None,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryAction) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn time_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

#[derive(Debug, Default)]
pub struct NotificationManager {
    notifications: Vec<Notification>,
    default_duration: Duration,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::with_default_duration(Duration::from_secs(5))
    }

    pub fn with_default_duration(default_duration: Duration) -> Self {
        Self {
            notifications: Vec::new(),
            default_duration,
        }
    }

    pub fn notify(&mut self, message: impl Into<String>, level: NotificationLevel) {
        self.show(Notification::new(message, level, self.default_duration));
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Info);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Warning);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Error);
    }

    /// Error that offers a retry
    pub fn error_with_retry(&mut self, message: impl Into<String>, retry: RetryAction) {
        self.show(Notification::new(message, NotificationLevel::Error, self.default_duration).with_retry(retry));
    }

    pub fn show(&mut self, notification: Notification) {
        self.notifications.insert(0, notification);
    }

    /// Remove expired notifications, returns true if any were removed
    pub fn update(&mut self) -> bool {
        let initial_len = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired());
        self.notifications.len() != initial_len
    }

    pub fn current(&self) -> Option<&Notification> {
        self.notifications.first()
    }

    pub fn all(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn clear(&mut self) {
        self.notifications.clear();
    }

    /// Remove the current notification, handing back its retry action
    pub fn dismiss_current(&mut self) -> Option<Notification> {
        if self.notifications.is_empty() {
            None
        } else {
            Some(self.notifications.remove(0))
        }
    }

    pub fn has_notifications(&self) -> bool {
        !self.notifications.is_empty()
    }

    pub fn count(&self) -> usize {
        self.notifications.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn notification_expiration() {
        let notification = Notification::new("test", NotificationLevel::Info, Duration::from_millis(50));
        assert!(!notification.is_expired());

        thread::sleep(Duration::from_millis(60));
        assert!(notification.is_expired());
    }

    #[test]
    fn manager_adds_and_retrieves() {
        let mut manager = NotificationManager::new();

        manager.info("First");
        manager.warn("Second");
        manager.error("Third");

        assert_eq!(manager.count(), 3);

        let current = manager.current().unwrap();
        assert_eq!(current.message, "Third");
        assert_eq!(current.level, NotificationLevel::Error);
        assert!(current.retry.is_none());
    }

    #[test]
    fn manager_removes_expired() {
        let mut manager = NotificationManager::with_default_duration(Duration::from_millis(50));

        manager.info("Short-lived");
        assert_eq!(manager.count(), 1);

        thread::sleep(Duration::from_millis(60));
        assert!(manager.update());
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn retry_travels_with_notification() {
        let mut manager = NotificationManager::new();
        manager.info("First");
        manager.error_with_retry("Delete failed", RetryAction::DeleteRegion(4));

        let dismissed = manager.dismiss_current().unwrap();
        assert_eq!(dismissed.retry, Some(RetryAction::DeleteRegion(4)));
        assert_eq!(manager.current().unwrap().message, "First");
    }
}
