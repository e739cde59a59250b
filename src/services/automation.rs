//! Recurring-debit batch.
//!
//! Invoked once per calendar day by an external trigger. Each due goal is
//! funded from its owner's wallet in its own atomic unit, keyed by an
//! idempotent per-day reference, so a failed goal never aborts the batch and
//! re-running the batch for the same day never double-charges.

use crate::error::{AppError, AppResult};
use crate::ledger::{transitions, LedgerExecutor, UnitOutcome};
use crate::models::{Goal, LedgerTransaction, TransactionStatus, TransactionType};
use crate::repositories::{
    GoalRepository, NewTransaction, TransactionRepository, WalletRepository,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Per-goal failure captured without interrupting the batch
#[derive(Debug, Clone, Serialize)]
pub struct AutomationFailure {
    pub goal_id: Uuid,
    pub error: String,
}

/// Batch result summary
#[derive(Debug, Default, Serialize)]
pub struct AutomationSummary {
    pub success: u32,
    pub failed: u32,
    pub errors: Vec<AutomationFailure>,
}

pub struct AutomationService {
    goal_repo: Arc<GoalRepository>,
    executor: Arc<LedgerExecutor>,
}

impl AutomationService {
    pub fn new(goal_repo: Arc<GoalRepository>, executor: Arc<LedgerExecutor>) -> Self {
        Self {
            goal_repo,
            executor,
        }
    }

    /// Process all recurring savings due today
    pub async fn run_daily(&self) -> AppResult<AutomationSummary> {
        self.run_for_date(Utc::now().date_naive()).await
    }

    /// Process all recurring savings due on the given date. Exposed
    /// separately so a missed batch day can be replayed.
    pub async fn run_for_date(&self, today: NaiveDate) -> AppResult<AutomationSummary> {
        let day = day_to_match(today);
        let cutoff = month_start(today);

        let goals = self.goal_repo.find_due_for_auto_debit(day, cutoff).await?;

        info!(
            count = goals.len(),
            day, "goals due for monthly automated savings"
        );

        let mut summary = AutomationSummary::default();

        for goal in goals {
            match self.debit_goal(&goal, today, cutoff).await {
                Ok(outcome) => {
                    if outcome.is_replay() {
                        info!(goal_id = %goal.id, "already debited for this day, skipping");
                    }
                    summary.success += 1;
                }
                Err(e) => {
                    error!(goal_id = %goal.id, error = %e, "automated saving failed");
                    summary.failed += 1;
                    summary.errors.push(AutomationFailure {
                        goal_id: goal.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            success = summary.success,
            failed = summary.failed,
            "automated savings batch finished"
        );

        Ok(summary)
    }

    /// Fund a single goal with its monthly amount in one idempotent unit
    async fn debit_goal(
        &self,
        goal: &Goal,
        today: NaiveDate,
        cutoff: NaiveDateTime,
    ) -> AppResult<UnitOutcome<(Goal, LedgerTransaction)>> {
        let reference = auto_debit_reference(goal.id, today);
        let unit_reference = reference.clone();
        let goal_id = goal.id;
        let user_id = goal.user_id;

        self.executor
            .execute_idempotent(&reference, move |conn: &mut PgConnection| {
                let reference = unit_reference.clone();
                Box::pin(async move {
                    // Lock order: goal, then wallet. Eligibility is
                    // re-checked under the lock; the selection query ran
                    // without one.
                    let goal = GoalRepository::lock_by_id(&mut *conn, goal_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))?;

                    if let Some(last) = goal.last_auto_debit_date {
                        if last >= cutoff {
                            return Err(AppError::AlreadyProcessed(format!(
                                "Goal {} was already debited this month",
                                goal.id
                            )));
                        }
                    }

                    let monthly_amount = goal.monthly_amount.ok_or_else(|| {
                        AppError::Validation("Goal has no monthly amount".to_string())
                    })?;

                    let wallet = WalletRepository::lock_by_user(&mut *conn, user_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Wallet not found".to_string()))?;

                    let funding = transitions::fund_goal(&goal, wallet.balance, monthly_amount)?;

                    let wallet = WalletRepository::apply_balance(
                        &mut *conn,
                        wallet.id,
                        funding.wallet.balance_after,
                    )
                    .await?;

                    let goal = GoalRepository::apply_auto_debit(
                        &mut *conn,
                        goal.id,
                        funding.goal_amount_after,
                        funding.status_after,
                        today.and_time(NaiveTime::MIN),
                    )
                    .await?;

                    let tx = TransactionRepository::insert(
                        &mut *conn,
                        NewTransaction {
                            wallet_id: wallet.id,
                            goal_id: Some(goal.id),
                            merchant_profile_id: None,
                            tx_type: TransactionType::AutomatedSavings,
                            amount: monthly_amount,
                            status: TransactionStatus::Completed,
                            reference: reference.clone(),
                            balance_before: Some(funding.wallet.balance_before),
                            balance_after: Some(funding.wallet.balance_after),
                            metadata: Some(serde_json::json!({
                                "isAutomated": true,
                                "month": today.month(),
                                "year": today.year(),
                            })),
                        },
                    )
                    .await?;

                    Ok((goal, tx))
                })
            })
            .await
    }
}

/// Day-of-month to match against `savings_day`, capped at 28 so every goal
/// gets exactly one debit opportunity per month regardless of month length.
pub fn day_to_match(today: NaiveDate) -> i32 {
    today.day().min(28) as i32
}

/// First instant of the month containing `today`; goals whose
/// `last_auto_debit_date` is on or after this were already charged.
pub fn month_start(today: NaiveDate) -> NaiveDateTime {
    today.with_day(1).unwrap_or(today).and_time(NaiveTime::MIN)
}

/// Idempotency reference for one goal's debit on one calendar day
pub fn auto_debit_reference(goal_id: Uuid, date: NaiveDate) -> String {
    format!("AUTO-{}-{}", goal_id, date.format("%Y-%m-%d"))
}
