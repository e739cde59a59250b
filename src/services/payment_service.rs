//! Gateway-backed payment boundary.
//!
//! External charges create PENDING transactions with no balance effect. Once
//! the gateway confirms a charge (webhook or polling — verification itself
//! happens upstream), `fulfill_payment` applies the balance effect and moves
//! the transaction to COMPLETED inside one atomic unit. Fulfilling a
//! reference that is already terminal is a no-op returning the existing row.

use crate::error::{AppError, AppResult};
use crate::ledger::{transitions, LedgerExecutor};
use crate::models::{LedgerTransaction, TransactionStatus, TransactionType};
use crate::repositories::{
    GoalRepository, NewTransaction, TransactionRepository, WalletRepository,
};
use crate::services::notifier::{
    dispatch, Notification, NotificationCategory, NotificationChannel, NotificationSink,
};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct PaymentService {
    wallet_repo: Arc<WalletRepository>,
    goal_repo: Arc<GoalRepository>,
    executor: Arc<LedgerExecutor>,
    notifier: Arc<dyn NotificationSink>,
}

impl PaymentService {
    pub fn new(
        wallet_repo: Arc<WalletRepository>,
        goal_repo: Arc<GoalRepository>,
        executor: Arc<LedgerExecutor>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            wallet_repo,
            goal_repo,
            executor,
            notifier,
        }
    }

    /// Create a PENDING deposit for an external charge. Returns the
    /// transaction whose reference the gateway charge must carry.
    pub async fn initiate_deposit(
        &self,
        user_id: Uuid,
        amount: Decimal,
    ) -> AppResult<LedgerTransaction> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount(amount));
        }

        let wallet = self.wallet_repo.get_or_create(user_id).await?;
        let reference = format!("DEP-{}", Uuid::new_v4());

        info!(%user_id, %amount, %reference, "initiating gateway deposit");

        let wallet_id = wallet.id;
        let tx = self
            .executor
            .execute(move |conn: &mut PgConnection| {
                let reference = reference.clone();
                Box::pin(async move {
                    let tx = TransactionRepository::insert(
                        &mut *conn,
                        NewTransaction {
                            wallet_id,
                            goal_id: None,
                            merchant_profile_id: None,
                            tx_type: TransactionType::Deposit,
                            amount,
                            status: TransactionStatus::Pending,
                            reference,
                            balance_before: None,
                            balance_after: None,
                            metadata: Some(json!({ "method": "gateway" })),
                        },
                    )
                    .await?;
                    Ok(tx)
                })
            })
            .await?;

        Ok(tx)
    }

    /// Create a PENDING goal-funding payment for an external charge
    pub async fn initiate_goal_funding(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        amount: Decimal,
    ) -> AppResult<LedgerTransaction> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount(amount));
        }

        let goal = self
            .goal_repo
            .find_by_id(goal_id)
            .await?
            .filter(|g| g.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))?;

        let wallet = self.wallet_repo.get_or_create(user_id).await?;
        let reference = format!("GF-{}", Uuid::new_v4());

        info!(%user_id, goal_id = %goal.id, %amount, %reference, "initiating gateway goal funding");

        let wallet_id = wallet.id;
        let goal_id = goal.id;
        let tx = self
            .executor
            .execute(move |conn: &mut PgConnection| {
                let reference = reference.clone();
                Box::pin(async move {
                    let tx = TransactionRepository::insert(
                        &mut *conn,
                        NewTransaction {
                            wallet_id,
                            goal_id: Some(goal_id),
                            merchant_profile_id: None,
                            tx_type: TransactionType::GoalFunding,
                            amount,
                            status: TransactionStatus::Pending,
                            reference,
                            balance_before: None,
                            balance_after: None,
                            metadata: Some(json!({ "method": "gateway" })),
                        },
                    )
                    .await?;
                    Ok(tx)
                })
            })
            .await?;

        Ok(tx)
    }

    /// Apply the effect of a verified external charge: the PENDING
    /// transaction becomes COMPLETED and the wallet or goal is credited, all
    /// in one unit. Safe to call more than once per reference.
    pub async fn fulfill_payment(&self, reference: &str) -> AppResult<LedgerTransaction> {
        let unit_reference = reference.to_string();

        let (tx, notification) = self
            .executor
            .execute(move |conn: &mut PgConnection| {
                let reference = unit_reference.clone();
                Box::pin(async move {
                    let tx = TransactionRepository::lock_by_reference(&mut *conn, &reference)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound(format!("Transaction {} not found", reference))
                        })?;

                    if !tx.is_pending() {
                        warn!(%reference, status = %tx.status, "payment already processed");
                        return Ok((tx, None));
                    }

                    match tx.tx_type() {
                        Some(TransactionType::Deposit) => {
                            let wallet = WalletRepository::lock_by_id(&mut *conn, tx.wallet_id)
                                .await?
                                .ok_or_else(|| {
                                    AppError::NotFound("Wallet not found".to_string())
                                })?;

                            let transition = transitions::credit(wallet.balance, tx.amount)?;

                            let wallet = WalletRepository::apply_balance(
                                &mut *conn,
                                wallet.id,
                                transition.balance_after,
                            )
                            .await?;

                            let tx = TransactionRepository::finalize_with_snapshots(
                                &mut *conn,
                                tx.id,
                                TransactionStatus::Completed,
                                transition.balance_before,
                                transition.balance_after,
                                json!({ "fulfilled": true }),
                            )
                            .await?;

                            let notification = Notification {
                                user_id: wallet.user_id,
                                title: "Deposit Successful".to_string(),
                                message: format!(
                                    "Your deposit of {} {} was successful.",
                                    tx.amount, wallet.currency
                                ),
                                category: NotificationCategory::Transaction,
                                channels: vec![
                                    NotificationChannel::InApp,
                                    NotificationChannel::Sms,
                                ],
                            };

                            Ok((tx, Some(notification)))
                        }
                        Some(TransactionType::GoalFunding) => {
                            let goal_id = tx.goal_id.ok_or_else(|| {
                                AppError::Validation(
                                    "Goal funding transaction has no goal".to_string(),
                                )
                            })?;

                            let goal = GoalRepository::lock_by_id(&mut *conn, goal_id)
                                .await?
                                .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))?;

                            if !goal.is_active() {
                                // The goal closed while the charge was in
                                // flight; fail the payment instead of funding
                                // a closed goal.
                                let tx = TransactionRepository::finalize(
                                    &mut *conn,
                                    tx.id,
                                    TransactionStatus::Failed,
                                    json!({ "error": "Goal is no longer active" }),
                                )
                                .await?;
                                return Ok((tx, None));
                            }

                            let goal_credit = transitions::credit_goal(&goal, tx.amount)?;

                            let goal = GoalRepository::apply_funding(
                                &mut *conn,
                                goal.id,
                                goal_credit.goal_amount_after,
                                goal_credit.status_after,
                            )
                            .await?;

                            let tx = TransactionRepository::finalize(
                                &mut *conn,
                                tx.id,
                                TransactionStatus::Completed,
                                json!({ "fulfilled": true }),
                            )
                            .await?;

                            let notification = Notification {
                                user_id: goal.user_id,
                                title: "Goal Funded".to_string(),
                                message: format!(
                                    "Your payment of {} towards \"{}\" was received.",
                                    tx.amount, goal.name
                                ),
                                category: NotificationCategory::Goal,
                                channels: vec![NotificationChannel::InApp],
                            };

                            Ok((tx, Some(notification)))
                        }
                        _ => Err(AppError::Validation(format!(
                            "Transaction {} is not a gateway-backed payment",
                            tx.id
                        ))),
                    }
                })
            })
            .await?;

        if let Some(notification) = notification {
            dispatch(self.notifier.as_ref(), notification).await;
        }

        Ok(tx)
    }

    /// Mark a PENDING gateway payment as FAILED (charge declined or expired).
    /// No balance was applied, so there is nothing to reverse.
    pub async fn fail_payment(
        &self,
        reference: &str,
        reason: &str,
    ) -> AppResult<LedgerTransaction> {
        let unit_reference = reference.to_string();
        let unit_reason = reason.to_string();

        let tx = self
            .executor
            .execute(move |conn: &mut PgConnection| {
                let reference = unit_reference.clone();
                let reason = unit_reason.clone();
                Box::pin(async move {
                    let tx = TransactionRepository::lock_by_reference(&mut *conn, &reference)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound(format!("Transaction {} not found", reference))
                        })?;

                    if !tx.is_pending() {
                        warn!(%reference, status = %tx.status, "payment already processed");
                        return Ok(tx);
                    }

                    let tx = TransactionRepository::finalize(
                        &mut *conn,
                        tx.id,
                        TransactionStatus::Failed,
                        json!({ "error": reason }),
                    )
                    .await?;

                    Ok(tx)
                })
            })
            .await?;

        Ok(tx)
    }
}
