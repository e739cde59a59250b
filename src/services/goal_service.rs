use crate::error::{AppError, AppResult};
use crate::ledger::{transitions, LedgerExecutor};
use crate::models::{Goal, GoalStatus, LedgerTransaction, TransactionStatus, TransactionType};
use crate::repositories::{
    GoalRepository, MerchantRepository, NewGoal, NewTransaction, ProductRepository,
    TransactionRepository, WalletRepository,
};
use crate::services::notifier::{
    dispatch, Notification, NotificationCategory, NotificationChannel, NotificationSink,
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Input for creating a goal. When `product_id` is set, the product's
/// current price overrides any client-supplied target amount.
#[derive(Debug, Clone, Default)]
pub struct CreateGoalInput {
    pub name: String,
    pub description: Option<String>,
    pub target_amount: Option<Decimal>,
    pub deadline: Option<NaiveDateTime>,
    pub product_id: Option<Uuid>,
    pub is_recurring: bool,
    pub monthly_amount: Option<Decimal>,
    pub savings_day: Option<i32>,
}

/// Recurring-debit settings update
#[derive(Debug, Clone, Default)]
pub struct RecurringSettings {
    pub is_recurring: bool,
    pub monthly_amount: Option<Decimal>,
    pub savings_day: Option<i32>,
}

/// Service for savings goals: creation, funding, reclaim, and redemption
pub struct GoalService {
    goal_repo: Arc<GoalRepository>,
    product_repo: Arc<ProductRepository>,
    executor: Arc<LedgerExecutor>,
    notifier: Arc<dyn NotificationSink>,
}

impl GoalService {
    pub fn new(
        goal_repo: Arc<GoalRepository>,
        product_repo: Arc<ProductRepository>,
        executor: Arc<LedgerExecutor>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            goal_repo,
            product_repo,
            executor,
            notifier,
        }
    }

    /// Create a new savings goal
    pub async fn create_goal(&self, user_id: Uuid, input: CreateGoalInput) -> AppResult<Goal> {
        // Product price is authoritative over any client-supplied target
        let target_amount = match input.product_id {
            Some(product_id) => {
                let product = self
                    .product_repo
                    .find_by_id(product_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
                product.price
            }
            None => input.target_amount.unwrap_or(Decimal::ZERO),
        };

        if target_amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount(target_amount));
        }

        validate_recurring(input.is_recurring, input.monthly_amount, input.savings_day)?;

        let goal = self
            .goal_repo
            .create(NewGoal {
                user_id,
                name: input.name,
                description: input.description,
                target_amount,
                product_id: input.product_id,
                is_recurring: input.is_recurring,
                monthly_amount: input.monthly_amount,
                savings_day: input.savings_day,
                deadline: input.deadline,
            })
            .await?;

        info!(goal_id = %goal.id, %user_id, %target_amount, "goal created");

        Ok(goal)
    }

    /// Get a single goal, enforcing ownership
    pub async fn get_goal(&self, user_id: Uuid, goal_id: Uuid) -> AppResult<Goal> {
        self.goal_repo
            .find_by_id(goal_id)
            .await?
            .filter(|g| g.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))
    }

    /// List the user's goals, newest first
    pub async fn list_goals(&self, user_id: Uuid) -> AppResult<Vec<Goal>> {
        Ok(self.goal_repo.list_by_user(user_id).await?)
    }

    /// Update recurring savings settings on an ACTIVE goal
    pub async fn update_recurring_settings(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        settings: RecurringSettings,
    ) -> AppResult<Goal> {
        let goal = self.get_goal(user_id, goal_id).await?;
        if !goal.is_active() {
            return Err(AppError::GoalNotActive(goal.id));
        }

        // Merge with existing values so partial updates keep prior settings
        let monthly_amount = settings.monthly_amount.or(goal.monthly_amount);
        let savings_day = settings.savings_day.or(goal.savings_day);
        validate_recurring(settings.is_recurring, monthly_amount, savings_day)?;

        Ok(self
            .goal_repo
            .update_recurring(goal_id, settings.is_recurring, monthly_amount, savings_day)
            .await?)
    }

    /// Fund a goal from the owner's wallet. Debits the wallet and credits the
    /// goal atomically; crossing the target completes the goal.
    pub async fn fund_goal(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        amount: Decimal,
    ) -> AppResult<(Goal, LedgerTransaction)> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount(amount));
        }

        info!(%goal_id, %user_id, %amount, "funding goal");

        let reference = format!("FUND-{}-{}", goal_id, Uuid::new_v4());

        let (goal, tx) = self
            .executor
            .execute(move |conn: &mut PgConnection| {
                let reference = reference.clone();
                Box::pin(async move {
                    // Lock order: goal, then wallet
                    let goal = GoalRepository::lock_by_id(&mut *conn, goal_id)
                        .await?
                        .filter(|g| g.user_id == user_id)
                        .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))?;

                    let wallet = WalletRepository::lock_by_user(&mut *conn, user_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Wallet not found".to_string()))?;

                    let funding = transitions::fund_goal(&goal, wallet.balance, amount)?;

                    let wallet = WalletRepository::apply_balance(
                        &mut *conn,
                        wallet.id,
                        funding.wallet.balance_after,
                    )
                    .await?;

                    let goal = GoalRepository::apply_funding(
                        &mut *conn,
                        goal.id,
                        funding.goal_amount_after,
                        funding.status_after,
                    )
                    .await?;

                    let tx = TransactionRepository::insert(
                        &mut *conn,
                        NewTransaction {
                            wallet_id: wallet.id,
                            goal_id: Some(goal.id),
                            merchant_profile_id: None,
                            tx_type: TransactionType::GoalFunding,
                            amount,
                            status: TransactionStatus::Completed,
                            reference,
                            balance_before: Some(funding.wallet.balance_before),
                            balance_after: Some(funding.wallet.balance_after),
                            metadata: None,
                        },
                    )
                    .await?;

                    Ok((goal, tx))
                })
            })
            .await?;

        dispatch(
            self.notifier.as_ref(),
            Notification {
                user_id,
                title: "Goal Funded".to_string(),
                message: format!("You saved {} towards \"{}\".", amount, goal.name),
                category: NotificationCategory::Goal,
                channels: vec![NotificationChannel::InApp],
            },
        )
        .await;

        if goal.status_enum() == GoalStatus::Completed {
            dispatch(
                self.notifier.as_ref(),
                Notification {
                    user_id,
                    title: "Goal Completed".to_string(),
                    message: format!("\"{}\" has reached its target. Ready to redeem!", goal.name),
                    category: NotificationCategory::Goal,
                    channels: vec![NotificationChannel::InApp, NotificationChannel::Sms],
                },
            )
            .await;
        }

        Ok((goal, tx))
    }

    /// Reclaim funds from a goal back into the wallet. `amount` defaults to
    /// the goal's full saved balance.
    pub async fn withdraw_from_goal(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        amount: Option<Decimal>,
    ) -> AppResult<(Goal, LedgerTransaction)> {
        info!(%goal_id, %user_id, "goal withdrawal");

        let reference = format!("GWTH-{}-{}", goal_id, Uuid::new_v4());

        let (goal, tx) = self
            .executor
            .execute(move |conn: &mut PgConnection| {
                let reference = reference.clone();
                Box::pin(async move {
                    // Lock order: goal, then wallet
                    let goal = GoalRepository::lock_by_id(&mut *conn, goal_id)
                        .await?
                        .filter(|g| g.user_id == user_id)
                        .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))?;

                    let wallet = WalletRepository::lock_by_user(&mut *conn, user_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Wallet not found".to_string()))?;

                    let withdrawal =
                        transitions::withdraw_from_goal(&goal, wallet.balance, amount)?;

                    // Debit the goal first, then credit the wallet
                    let goal = GoalRepository::apply_funding(
                        &mut *conn,
                        goal.id,
                        withdrawal.goal_amount_after,
                        withdrawal.status_after,
                    )
                    .await?;

                    let wallet = WalletRepository::apply_balance(
                        &mut *conn,
                        wallet.id,
                        withdrawal.wallet.balance_after,
                    )
                    .await?;

                    let tx = TransactionRepository::insert(
                        &mut *conn,
                        NewTransaction {
                            wallet_id: wallet.id,
                            goal_id: Some(goal.id),
                            merchant_profile_id: None,
                            tx_type: TransactionType::GoalWithdrawal,
                            amount: withdrawal.amount,
                            status: TransactionStatus::Completed,
                            reference,
                            balance_before: Some(withdrawal.wallet.balance_before),
                            balance_after: Some(withdrawal.wallet.balance_after),
                            metadata: None,
                        },
                    )
                    .await?;

                    Ok((goal, tx))
                })
            })
            .await?;

        dispatch(
            self.notifier.as_ref(),
            Notification {
                user_id,
                title: "Goal Withdrawal".to_string(),
                message: format!("You moved {} from \"{}\" back to your wallet.", tx.amount, goal.name),
                category: NotificationCategory::Goal,
                channels: vec![NotificationChannel::InApp],
            },
        )
        .await;

        Ok((goal, tx))
    }

    /// Redeem a COMPLETED, product-linked goal: archives the goal and pays
    /// the merchant the goal's full saved amount in one atomic unit.
    pub async fn redeem_goal(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
    ) -> AppResult<(Goal, LedgerTransaction)> {
        info!(%goal_id, %user_id, "redeeming goal");

        let reference = format!("PAYOUT-{}-{}", goal_id, Uuid::new_v4());

        let (goal, tx, merchant_user_id) = self
            .executor
            .execute(move |conn: &mut PgConnection| {
                let reference = reference.clone();
                Box::pin(async move {
                    // Lock order: goal, then merchant
                    let goal = GoalRepository::lock_by_id(&mut *conn, goal_id)
                        .await?
                        .filter(|g| g.user_id == user_id)
                        .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))?;

                    let product_id = goal.product_id.ok_or_else(|| {
                        AppError::NotRedeemable(
                            "Goal is not linked to a merchant product".to_string(),
                        )
                    })?;

                    let product = ProductRepository::find_by_id_in(&mut *conn, product_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

                    let merchant =
                        MerchantRepository::lock_by_id(&mut *conn, product.merchant_profile_id)
                            .await?
                            .ok_or_else(|| {
                                AppError::NotFound("Merchant profile not found".to_string())
                            })?;

                    let redemption = transitions::redeem_goal(&goal, merchant.balance)?;

                    let merchant = MerchantRepository::apply_balance(
                        &mut *conn,
                        merchant.id,
                        redemption.merchant.balance_after,
                    )
                    .await?;

                    let goal =
                        GoalRepository::set_status(&mut *conn, goal.id, GoalStatus::Archived)
                            .await?;

                    let wallet = WalletRepository::find_by_user_in(&mut *conn, user_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Wallet not found".to_string()))?;

                    let tx = TransactionRepository::insert(
                        &mut *conn,
                        NewTransaction {
                            wallet_id: wallet.id,
                            goal_id: Some(goal.id),
                            merchant_profile_id: Some(merchant.id),
                            tx_type: TransactionType::MerchantPayout,
                            amount: redemption.amount,
                            status: TransactionStatus::Completed,
                            reference,
                            balance_before: Some(redemption.merchant.balance_before),
                            balance_after: Some(redemption.merchant.balance_after),
                            metadata: Some(json!({
                                "merchantId": merchant.id,
                                "productId": product.id,
                            })),
                        },
                    )
                    .await?;

                    Ok((goal, tx, merchant.user_id))
                })
            })
            .await?;

        dispatch(
            self.notifier.as_ref(),
            Notification {
                user_id,
                title: "Goal Redeemed".to_string(),
                message: format!("\"{}\" was redeemed and the merchant has been paid.", goal.name),
                category: NotificationCategory::Goal,
                channels: vec![NotificationChannel::InApp],
            },
        )
        .await;

        dispatch(
            self.notifier.as_ref(),
            Notification {
                user_id: merchant_user_id,
                title: "Payment Received".to_string(),
                message: format!("A redeemed goal credited {} to your merchant balance.", tx.amount),
                category: NotificationCategory::Transaction,
                channels: vec![NotificationChannel::InApp],
            },
        )
        .await;

        Ok((goal, tx))
    }
}

/// Recurring settings must carry a positive monthly amount and a savings day
/// in 1..=28 (one debit opportunity per month regardless of month length)
fn validate_recurring(
    is_recurring: bool,
    monthly_amount: Option<Decimal>,
    savings_day: Option<i32>,
) -> AppResult<()> {
    if let Some(day) = savings_day {
        if !(1..=28).contains(&day) {
            return Err(AppError::Validation(
                "savings_day must be between 1 and 28".to_string(),
            ));
        }
    }

    if is_recurring {
        match monthly_amount {
            Some(amount) if amount > Decimal::ZERO => {}
            Some(amount) => return Err(AppError::InvalidAmount(amount)),
            None => {
                return Err(AppError::Validation(
                    "monthly_amount is required for recurring goals".to_string(),
                ))
            }
        }
        if savings_day.is_none() {
            return Err(AppError::Validation(
                "savings_day is required for recurring goals".to_string(),
            ));
        }
    }

    Ok(())
}
