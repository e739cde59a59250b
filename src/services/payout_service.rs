//! Merchant payout workflow.
//!
//! A payout request places a hold: the merchant balance is debited the
//! moment the request is made and a PENDING transaction records the
//! reservation. Approval is a status transition only; rejection is the
//! compensating credit, applied in the same unit as the status change.

use crate::error::{AppError, AppResult};
use crate::ledger::{transitions, LedgerExecutor};
use crate::models::{LedgerTransaction, TransactionStatus, TransactionType};
use crate::repositories::{
    AuditEntry, AuditRepository, MerchantRepository, NewTransaction, TransactionRepository,
    WalletRepository,
};
use crate::services::notifier::{
    dispatch, Notification, NotificationCategory, NotificationChannel, NotificationSink,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct PayoutService {
    executor: Arc<LedgerExecutor>,
    notifier: Arc<dyn NotificationSink>,
}

impl PayoutService {
    pub fn new(executor: Arc<LedgerExecutor>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { executor, notifier }
    }

    /// Request a payout: immediately debit the merchant balance and create a
    /// PENDING transaction carrying the hold's balance snapshots and a bank
    /// detail snapshot for processing.
    pub async fn request_payout(
        &self,
        merchant_user_id: Uuid,
        amount: Decimal,
    ) -> AppResult<LedgerTransaction> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount(amount));
        }

        info!(%merchant_user_id, %amount, "payout requested");

        let reference = format!("PO-{}", Uuid::new_v4());

        let tx = self
            .executor
            .execute(move |conn: &mut PgConnection| {
                let reference = reference.clone();
                Box::pin(async move {
                    let merchant = MerchantRepository::lock_by_user(&mut *conn, merchant_user_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound("Merchant profile not found".to_string())
                        })?;

                    let wallet = WalletRepository::find_by_user_in(&mut *conn, merchant_user_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound("Merchant wallet not found".to_string())
                        })?;

                    let hold = transitions::request_payout(merchant.balance, amount)?;

                    let merchant = MerchantRepository::apply_balance(
                        &mut *conn,
                        merchant.id,
                        hold.balance_after,
                    )
                    .await?;

                    let tx = TransactionRepository::insert(
                        &mut *conn,
                        NewTransaction {
                            wallet_id: wallet.id,
                            goal_id: None,
                            merchant_profile_id: Some(merchant.id),
                            tx_type: TransactionType::MerchantPayout,
                            amount,
                            status: TransactionStatus::Pending,
                            reference,
                            balance_before: Some(hold.balance_before),
                            balance_after: Some(hold.balance_after),
                            metadata: Some(json!({
                                "requestedAt": Utc::now().to_rfc3339(),
                                "bankName": merchant.bank_name,
                                "accountNo": merchant.bank_account_no,
                                "accountName": merchant.bank_account_name,
                            })),
                        },
                    )
                    .await?;

                    AuditRepository::record(
                        &mut *conn,
                        AuditEntry {
                            user_id: Some(merchant_user_id),
                            action: "PAYOUT_REQUESTED",
                            resource: "Transaction",
                            resource_id: Some(tx.id.to_string()),
                            old_value: Some(json!({ "balance": hold.balance_before })),
                            new_value: Some(json!({
                                "amount": amount,
                                "reference": tx.reference,
                            })),
                        },
                    )
                    .await?;

                    Ok(tx)
                })
            })
            .await?;

        Ok(tx)
    }

    /// Approve a pending payout. The funds were already held at request
    /// time, so this is a status transition plus an audit record.
    pub async fn approve_payout(
        &self,
        admin_id: Uuid,
        transaction_id: Uuid,
    ) -> AppResult<LedgerTransaction> {
        info!(%admin_id, %transaction_id, "approving payout");

        let tx = self
            .executor
            .execute(move |conn: &mut PgConnection| {
                Box::pin(async move {
                    let tx = load_pending_payout(&mut *conn, transaction_id).await?;

                    let updated = TransactionRepository::finalize(
                        &mut *conn,
                        tx.id,
                        TransactionStatus::Completed,
                        json!({
                            "approvedBy": admin_id,
                            "approvedAt": Utc::now().to_rfc3339(),
                        }),
                    )
                    .await?;

                    AuditRepository::record(
                        &mut *conn,
                        AuditEntry {
                            user_id: Some(admin_id),
                            action: "PAYOUT_APPROVED",
                            resource: "Transaction",
                            resource_id: Some(updated.id.to_string()),
                            old_value: Some(json!({ "status": tx.status })),
                            new_value: Some(json!({ "status": updated.status })),
                        },
                    )
                    .await?;

                    Ok(updated)
                })
            })
            .await?;

        Ok(tx)
    }

    /// Reject a pending payout: restore the merchant balance by exactly the
    /// held amount in the same unit that marks the transaction FAILED.
    pub async fn reject_payout(
        &self,
        admin_id: Uuid,
        transaction_id: Uuid,
        reason: &str,
    ) -> AppResult<LedgerTransaction> {
        info!(%admin_id, %transaction_id, "rejecting payout");

        let unit_reason = reason.to_string();

        let (tx, merchant_user_id) = self
            .executor
            .execute(move |conn: &mut PgConnection| {
                let reason = unit_reason.clone();
                Box::pin(async move {
                    let tx = load_pending_payout(&mut *conn, transaction_id).await?;

                    let merchant_id = tx.merchant_profile_id.ok_or_else(|| {
                        AppError::Validation(
                            "Payout transaction has no merchant profile".to_string(),
                        )
                    })?;

                    let merchant = MerchantRepository::lock_by_id(&mut *conn, merchant_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound("Merchant profile not found".to_string())
                        })?;

                    let restore = transitions::reject_payout(merchant.balance, tx.amount)?;

                    let merchant = MerchantRepository::apply_balance(
                        &mut *conn,
                        merchant.id,
                        restore.balance_after,
                    )
                    .await?;

                    let updated = TransactionRepository::finalize(
                        &mut *conn,
                        tx.id,
                        TransactionStatus::Failed,
                        json!({
                            "rejectedBy": admin_id,
                            "rejectionReason": reason,
                        }),
                    )
                    .await?;

                    AuditRepository::record(
                        &mut *conn,
                        AuditEntry {
                            user_id: Some(admin_id),
                            action: "PAYOUT_REJECTED",
                            resource: "Transaction",
                            resource_id: Some(updated.id.to_string()),
                            old_value: Some(json!({ "balance": restore.balance_before })),
                            new_value: Some(json!({
                                "balance": restore.balance_after,
                                "reason": reason,
                            })),
                        },
                    )
                    .await?;

                    Ok((updated, merchant.user_id))
                })
            })
            .await?;

        dispatch(
            self.notifier.as_ref(),
            Notification {
                user_id: merchant_user_id,
                title: "Payout Rejected".to_string(),
                message: format!(
                    "Your payout request of {} was rejected and the funds returned to your balance.",
                    tx.amount
                ),
                category: NotificationCategory::Transaction,
                channels: vec![NotificationChannel::InApp],
            },
        )
        .await;

        Ok(tx)
    }
}

/// Load a MERCHANT_PAYOUT transaction that is still PENDING, under a row
/// lock. A missing row or a non-payout type is NotFound; a terminal status
/// is AlreadyProcessed.
async fn load_pending_payout(
    conn: &mut PgConnection,
    transaction_id: Uuid,
) -> AppResult<LedgerTransaction> {
    let tx = TransactionRepository::lock_by_id(&mut *conn, transaction_id)
        .await?
        .filter(|t| t.tx_type() == Some(TransactionType::MerchantPayout))
        .ok_or_else(|| AppError::NotFound("Payout transaction not found".to_string()))?;

    if !tx.is_pending() {
        return Err(AppError::AlreadyProcessed(format!(
            "Transaction {} is already {}",
            tx.id, tx.status
        )));
    }

    Ok(tx)
}
