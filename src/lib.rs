//! Susu Backend Library
//!
//! The ledger and goal-funding core of the Susu save-now-buy-later platform.
//! This module exposes the backend components for use by the API layer and
//! by tests.

pub mod config;
pub mod database;
pub mod error;
pub mod ledger;
pub mod models;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use database::Database;
use ledger::LedgerExecutor;
use repositories::*;
use services::notifier::NotificationSink;
use services::*;
use std::sync::Arc;

/// Application state containing all repositories and services
pub struct AppState {
    pub database: Database,
    pub executor: Arc<LedgerExecutor>,
    pub wallet_repo: Arc<WalletRepository>,
    pub goal_repo: Arc<GoalRepository>,
    pub merchant_repo: Arc<MerchantRepository>,
    pub product_repo: Arc<ProductRepository>,
    pub transaction_repo: Arc<TransactionRepository>,
    pub audit_repo: Arc<AuditRepository>,
    pub wallet_service: Arc<WalletService>,
    pub goal_service: Arc<GoalService>,
    pub payment_service: Arc<PaymentService>,
    pub payout_service: Arc<PayoutService>,
    pub automation: Arc<AutomationService>,
}

impl AppState {
    /// Create a new AppState with initialized repositories and services
    pub fn new(pool: sqlx::PgPool, notifier: Arc<dyn NotificationSink>) -> Self {
        let database = Database::new(pool.clone());
        let executor = Arc::new(LedgerExecutor::new(pool.clone()));

        let wallet_repo = Arc::new(WalletRepository::new(pool.clone()));
        let goal_repo = Arc::new(GoalRepository::new(pool.clone()));
        let merchant_repo = Arc::new(MerchantRepository::new(pool.clone()));
        let product_repo = Arc::new(ProductRepository::new(pool.clone()));
        let transaction_repo = Arc::new(TransactionRepository::new(pool.clone()));
        let audit_repo = Arc::new(AuditRepository::new(pool));

        let wallet_service = Arc::new(WalletService::new(
            wallet_repo.clone(),
            transaction_repo.clone(),
            executor.clone(),
            notifier.clone(),
        ));
        let goal_service = Arc::new(GoalService::new(
            goal_repo.clone(),
            product_repo.clone(),
            executor.clone(),
            notifier.clone(),
        ));
        let payment_service = Arc::new(PaymentService::new(
            wallet_repo.clone(),
            goal_repo.clone(),
            executor.clone(),
            notifier.clone(),
        ));
        let payout_service = Arc::new(PayoutService::new(executor.clone(), notifier));
        let automation = Arc::new(AutomationService::new(goal_repo.clone(), executor.clone()));

        Self {
            database,
            executor,
            wallet_repo,
            goal_repo,
            merchant_repo,
            product_repo,
            transaction_repo,
            audit_repo,
            wallet_service,
            goal_service,
            payment_service,
            payout_service,
            automation,
        }
    }
}
