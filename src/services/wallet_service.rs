use crate::error::{AppError, AppResult};
use crate::ledger::{transitions, LedgerExecutor, UnitOutcome};
use crate::models::{LedgerTransaction, TransactionStatus, TransactionType, Wallet};
use crate::repositories::{
    AuditEntry, AuditRepository, NewTransaction, TransactionRepository, WalletRepository,
};
use crate::services::notifier::{
    dispatch, Notification, NotificationCategory, NotificationChannel, NotificationSink,
};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Service for custodial wallet operations
pub struct WalletService {
    wallet_repo: Arc<WalletRepository>,
    transaction_repo: Arc<TransactionRepository>,
    executor: Arc<LedgerExecutor>,
    notifier: Arc<dyn NotificationSink>,
}

impl WalletService {
    pub fn new(
        wallet_repo: Arc<WalletRepository>,
        transaction_repo: Arc<TransactionRepository>,
        executor: Arc<LedgerExecutor>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            wallet_repo,
            transaction_repo,
            executor,
            notifier,
        }
    }

    /// Get a user's wallet, creating it with a zero balance if absent
    pub async fn get_wallet(&self, user_id: Uuid) -> AppResult<Wallet> {
        Ok(self.wallet_repo.get_or_create(user_id).await?)
    }

    /// Deposit funds into a wallet (internal/manual flow, completed
    /// immediately). A caller-supplied reference makes the deposit
    /// replay-safe: the same reference is applied exactly once.
    pub async fn deposit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reference: Option<String>,
    ) -> AppResult<(Wallet, LedgerTransaction)> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount(amount));
        }

        info!(%user_id, %amount, "wallet deposit");

        // Lazy wallet creation happens before the unit; the unit itself
        // re-reads the row under a lock.
        self.wallet_repo.get_or_create(user_id).await?;

        let reference = reference.unwrap_or_else(|| format!("DEP-{}", Uuid::new_v4()));
        let unit_reference = reference.clone();

        let outcome = self
            .executor
            .execute_idempotent(&reference, move |conn: &mut PgConnection| {
                let reference = unit_reference.clone();
                Box::pin(async move {
                    let wallet = WalletRepository::lock_by_user(&mut *conn, user_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Wallet not found".to_string()))?;

                    let transition = transitions::credit(wallet.balance, amount)?;

                    let wallet =
                        WalletRepository::apply_balance(&mut *conn, wallet.id, transition.balance_after)
                            .await?;

                    let tx = TransactionRepository::insert(
                        &mut *conn,
                        NewTransaction {
                            wallet_id: wallet.id,
                            goal_id: None,
                            merchant_profile_id: None,
                            tx_type: TransactionType::Deposit,
                            amount,
                            status: TransactionStatus::Completed,
                            reference: reference.clone(),
                            balance_before: Some(transition.balance_before),
                            balance_after: Some(transition.balance_after),
                            metadata: Some(json!({ "method": "manual" })),
                        },
                    )
                    .await?;

                    AuditRepository::record(
                        &mut *conn,
                        AuditEntry {
                            user_id: Some(user_id),
                            action: "WALLET_DEPOSIT",
                            resource: "Wallet",
                            resource_id: Some(wallet.id.to_string()),
                            old_value: Some(json!({ "balance": transition.balance_before })),
                            new_value: Some(json!({ "amount": amount, "reference": reference })),
                        },
                    )
                    .await?;

                    Ok((wallet, tx))
                })
            })
            .await?;

        match outcome {
            UnitOutcome::Applied((wallet, tx)) => {
                dispatch(
                    self.notifier.as_ref(),
                    Notification {
                        user_id,
                        title: "Deposit Successful".to_string(),
                        message: format!(
                            "Your deposit of {} {} was successful.",
                            amount, wallet.currency
                        ),
                        category: NotificationCategory::Transaction,
                        channels: vec![NotificationChannel::InApp, NotificationChannel::Sms],
                    },
                )
                .await;
                Ok((wallet, tx))
            }
            UnitOutcome::Replayed(existing) => {
                let wallet = self.wallet_repo.get_or_create(user_id).await?;
                Ok((wallet, existing))
            }
        }
    }

    /// Withdraw funds from a wallet
    pub async fn withdraw(
        &self,
        user_id: Uuid,
        amount: Decimal,
    ) -> AppResult<(Wallet, LedgerTransaction)> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount(amount));
        }

        info!(%user_id, %amount, "wallet withdrawal");

        let reference = format!("WTH-{}", Uuid::new_v4());

        let (wallet, tx) = self
            .executor
            .execute(move |conn: &mut PgConnection| {
                let reference = reference.clone();
                Box::pin(async move {
                    let wallet = WalletRepository::lock_by_user(&mut *conn, user_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Wallet not found".to_string()))?;

                    let transition = transitions::debit(wallet.balance, amount)?;

                    let wallet =
                        WalletRepository::apply_balance(&mut *conn, wallet.id, transition.balance_after)
                            .await?;

                    let tx = TransactionRepository::insert(
                        &mut *conn,
                        NewTransaction {
                            wallet_id: wallet.id,
                            goal_id: None,
                            merchant_profile_id: None,
                            tx_type: TransactionType::Withdrawal,
                            amount,
                            status: TransactionStatus::Completed,
                            reference: reference.clone(),
                            balance_before: Some(transition.balance_before),
                            balance_after: Some(transition.balance_after),
                            metadata: None,
                        },
                    )
                    .await?;

                    AuditRepository::record(
                        &mut *conn,
                        AuditEntry {
                            user_id: Some(user_id),
                            action: "WALLET_WITHDRAW",
                            resource: "Wallet",
                            resource_id: Some(wallet.id.to_string()),
                            old_value: Some(json!({ "balance": transition.balance_before })),
                            new_value: Some(json!({ "amount": amount })),
                        },
                    )
                    .await?;

                    Ok((wallet, tx))
                })
            })
            .await?;

        dispatch(
            self.notifier.as_ref(),
            Notification {
                user_id,
                title: "Withdrawal Successful".to_string(),
                message: format!("You withdrew {} {} from your wallet.", amount, wallet.currency),
                category: NotificationCategory::Transaction,
                channels: vec![NotificationChannel::InApp],
            },
        )
        .await;

        Ok((wallet, tx))
    }

    /// Get transaction history for a user's wallet, newest first
    pub async fn transactions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<LedgerTransaction>> {
        let wallet = self.wallet_repo.get_or_create(user_id).await?;
        Ok(self.transaction_repo.list_by_wallet(wallet.id, limit).await?)
    }
}
