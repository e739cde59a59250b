pub mod automation;
pub mod goal_service;
pub mod notifier;
pub mod payment_service;
pub mod payout_service;
pub mod wallet_service;

pub use automation::{AutomationFailure, AutomationService, AutomationSummary};
pub use goal_service::{CreateGoalInput, GoalService, RecurringSettings};
pub use notifier::{
    LogNotifier, Notification, NotificationCategory, NotificationChannel, NotificationSink,
    WebhookNotifier,
};
pub use payment_service::PaymentService;
pub use payout_service::PayoutService;
pub use wallet_service::WalletService;
