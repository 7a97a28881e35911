//! Notification service port (driven/secondary port)
//!
//! This module defines the interface for showing transient messages
//! (toasts) to the student: answers saved locally, time up, sync warnings
//! and remote failures.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because delivery is adapter-specific.
//! - Notifications are fire-and-forget; a delivery failure is logged by the
//!   caller and never changes session state.

use serde::{Deserialize, Serialize};

// ============================================================================
// Notification struct and NotificationPriority enum
// ============================================================================

/// Priority level for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    /// Informational, may auto-dismiss quickly
    Low,
    /// Shown as a regular toast
    Normal,
    /// Warning or error, stays visible longer
    High,
}

impl Default for NotificationPriority {
    fn default() -> Self {
        NotificationPriority::Normal
    }
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// A message to show the student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Short title
    pub title: String,
    /// Body text with details
    pub body: String,
    pub priority: NotificationPriority,
    /// Category for grouping/filtering ("answers", "timer", "sync", "auth", "error")
    pub category: String,
}

impl Notification {
    /// Creates a notification with `Normal` priority and no category
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: NotificationPriority::Normal,
            category: String::new(),
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// "Answer saved locally" toast shown when an answer is queued offline
    pub fn saved_locally() -> Self {
        Self::new(
            "Saved locally",
            "You are offline. Your answer will be sent when the connection returns.",
        )
        .with_priority(NotificationPriority::Low)
        .with_category("answers")
    }

    /// Shown when the countdown reaches zero
    pub fn time_up() -> Self {
        Self::new("Time's up", "Your test is being submitted.")
            .with_priority(NotificationPriority::High)
            .with_category("timer")
    }

    /// Sync-related warning (e.g. answers dropped after retries)
    pub fn sync_warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::High)
            .with_category("sync")
    }

    /// The server refused the credentials; queued answers are kept
    pub fn sign_in_required() -> Self {
        Self::new(
            "Sign in again",
            "Your session has expired. Sign in again so your saved answers can be sent.",
        )
        .with_priority(NotificationPriority::High)
        .with_category("auth")
    }

    /// Error notification with High priority
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::High)
            .with_category("error")
    }
}

// ============================================================================
// INotificationService trait
// ============================================================================

/// Port trait for user-facing toasts
#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}
