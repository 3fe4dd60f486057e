//! Fire-and-forget notification sink. Implementations must not block and
//! must swallow their own delivery failures.

use std::sync::{Mutex, PoisonError};

use rust_decimal::Decimal;
use tracing::{info, warn};

pub trait NotificationSink: Send + Sync {
    fn sync_success(&self, provider_name: &str);

    fn sync_error(&self, provider_name: &str);

    fn budget_exceeded(&self, budget_name: &str, exceeded_by: Decimal);

    fn budget_warning(&self, budget_name: &str, usage_percentage: f64);

    fn category_exceeded(&self, category_name: &str, budget_name: &str);

    fn large_transaction(&self, amount: Decimal, description: Option<&str>);
}

impl std::fmt::Debug for dyn NotificationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NotificationSink")
    }
}

/// Emits every notification as a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn sync_success(&self, provider_name: &str) {
        info!(provider = provider_name, "sync completed");
    }

    fn sync_error(&self, provider_name: &str) {
        warn!(provider = provider_name, "sync failed");
    }

    fn budget_exceeded(&self, budget_name: &str, exceeded_by: Decimal) {
        warn!(budget = budget_name, %exceeded_by, "budget exceeded");
    }

    fn budget_warning(&self, budget_name: &str, usage_percentage: f64) {
        warn!(budget = budget_name, usage = usage_percentage.floor(), "budget nearly used");
    }

    fn category_exceeded(&self, category_name: &str, budget_name: &str) {
        warn!(category = category_name, budget = budget_name, "category limit exceeded");
    }

    fn large_transaction(&self, amount: Decimal, description: Option<&str>) {
        info!(%amount, description = description.unwrap_or(""), "large transaction");
    }
}

/// Delivered notification, as captured by [`RecordingNotificationSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    SyncSuccess(String),
    SyncError(String),
    BudgetExceeded { budget: String, exceeded_by: Decimal },
    BudgetWarning { budget: String, usage_percentage: f64 },
    CategoryExceeded { category: String, budget: String },
    LargeTransaction { amount: Decimal, description: Option<String> },
}

/// In-memory sink for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, notification: Notification) {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn sync_success(&self, provider_name: &str) {
        self.push(Notification::SyncSuccess(provider_name.to_owned()));
    }

    fn sync_error(&self, provider_name: &str) {
        self.push(Notification::SyncError(provider_name.to_owned()));
    }

    fn budget_exceeded(&self, budget_name: &str, exceeded_by: Decimal) {
        self.push(Notification::BudgetExceeded {
            budget: budget_name.to_owned(),
            exceeded_by,
        });
    }

    fn budget_warning(&self, budget_name: &str, usage_percentage: f64) {
        self.push(Notification::BudgetWarning {
            budget: budget_name.to_owned(),
            usage_percentage,
        });
    }

    fn category_exceeded(&self, category_name: &str, budget_name: &str) {
        self.push(Notification::CategoryExceeded {
            category: category_name.to_owned(),
            budget: budget_name.to_owned(),
        });
    }

    fn large_transaction(&self, amount: Decimal, description: Option<&str>) {
        self.push(Notification::LargeTransaction {
            amount,
            description: description.map(str::to_owned),
        });
    }
}
