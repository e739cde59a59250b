//! Balance transition rules for every money-movement operation.
//!
//! Pure functions, no I/O: given current entity state and a requested amount,
//! each returns the before/after balance pair and the resulting entity state,
//! or a typed rejection. The executor applies the results atomically.

use crate::error::{AppError, AppResult};
use crate::models::{Goal, GoalStatus};
use rust_decimal::Decimal;

/// Before/after snapshot of a single balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub balance_before: Decimal,
    pub balance_after: Decimal,
}

impl Transition {
    /// Signed change applied by this transition
    pub fn delta(&self) -> Decimal {
        self.balance_after - self.balance_before
    }
}

/// Credit a wallet or merchant balance.
pub fn credit(balance: Decimal, amount: Decimal) -> AppResult<Transition> {
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidAmount(amount));
    }
    Ok(Transition {
        balance_before: balance,
        balance_after: balance + amount,
    })
}

/// Debit a wallet or merchant balance. Rejects when the balance would go
/// negative.
pub fn debit(balance: Decimal, amount: Decimal) -> AppResult<Transition> {
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidAmount(amount));
    }
    if balance < amount {
        return Err(AppError::InsufficientBalance {
            available: balance,
            required: amount,
        });
    }
    Ok(Transition {
        balance_before: balance,
        balance_after: balance - amount,
    })
}

/// Result of funding a goal from a wallet: a wallet debit, a goal credit,
/// and the goal's resulting status.
#[derive(Debug, Clone, Copy)]
pub struct GoalFunding {
    pub wallet: Transition,
    pub goal_amount_before: Decimal,
    pub goal_amount_after: Decimal,
    pub status_after: GoalStatus,
}

impl GoalFunding {
    /// True when this funding crossed the target and completed the goal
    pub fn completes(&self) -> bool {
        self.status_after == GoalStatus::Completed
    }
}

/// Goal-side credit: the new saved amount and resulting status.
#[derive(Debug, Clone, Copy)]
pub struct GoalCredit {
    pub goal_amount_before: Decimal,
    pub goal_amount_after: Decimal,
    pub status_after: GoalStatus,
}

/// Credit an ACTIVE goal without touching a wallet (gateway-funded flows).
/// Crossing the target flips the goal to COMPLETED; overshoot is permitted.
pub fn credit_goal(goal: &Goal, amount: Decimal) -> AppResult<GoalCredit> {
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidAmount(amount));
    }
    if !goal.is_active() {
        return Err(AppError::GoalNotActive(goal.id));
    }

    let goal_amount_after = goal.current_amount + amount;
    let status_after = if goal_amount_after >= goal.target_amount {
        GoalStatus::Completed
    } else {
        GoalStatus::Active
    };

    Ok(GoalCredit {
        goal_amount_before: goal.current_amount,
        goal_amount_after,
        status_after,
    })
}

/// Fund an ACTIVE goal from a wallet. Funding past the target is permitted
/// and completes in full; crossing the threshold flips the goal to COMPLETED.
pub fn fund_goal(goal: &Goal, wallet_balance: Decimal, amount: Decimal) -> AppResult<GoalFunding> {
    let goal_credit = credit_goal(goal, amount)?;
    let wallet = debit(wallet_balance, amount)?;

    Ok(GoalFunding {
        wallet,
        goal_amount_before: goal_credit.goal_amount_before,
        goal_amount_after: goal_credit.goal_amount_after,
        status_after: goal_credit.status_after,
    })
}

/// Result of reclaiming funds from a goal back into the wallet.
#[derive(Debug, Clone, Copy)]
pub struct GoalWithdrawal {
    /// Resolved amount (defaults to the goal's full balance)
    pub amount: Decimal,
    pub wallet: Transition,
    pub goal_amount_before: Decimal,
    pub goal_amount_after: Decimal,
    pub status_after: GoalStatus,
}

/// Reverse funding: debit the goal, credit the wallet. `amount` defaults to
/// the goal's entire saved balance. A COMPLETED goal whose balance drops
/// below target reverts to ACTIVE; ARCHIVED and CANCELLED goals hold no
/// reclaimable funds.
pub fn withdraw_from_goal(
    goal: &Goal,
    wallet_balance: Decimal,
    amount: Option<Decimal>,
) -> AppResult<GoalWithdrawal> {
    let status = goal.status_enum();
    if status != GoalStatus::Active && status != GoalStatus::Completed {
        return Err(AppError::GoalNotActive(goal.id));
    }

    let amount = amount.unwrap_or(goal.current_amount);
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidAmount(amount));
    }
    if goal.current_amount < amount {
        return Err(AppError::InsufficientGoalBalance {
            available: goal.current_amount,
            required: amount,
        });
    }

    let goal_amount_after = goal.current_amount - amount;
    let status_after = if status == GoalStatus::Completed && goal_amount_after < goal.target_amount
    {
        GoalStatus::Active
    } else {
        status
    };

    Ok(GoalWithdrawal {
        amount,
        wallet: credit(wallet_balance, amount)?,
        goal_amount_before: goal.current_amount,
        goal_amount_after,
        status_after,
    })
}

/// Result of redeeming a completed goal to its merchant.
#[derive(Debug, Clone, Copy)]
pub struct Redemption {
    /// Full saved amount paid to the merchant, overshoot included
    pub amount: Decimal,
    pub merchant: Transition,
}

/// Redeem a COMPLETED, product-linked goal: the merchant is credited the
/// goal's full saved amount and the goal is archived by the caller.
pub fn redeem_goal(goal: &Goal, merchant_balance: Decimal) -> AppResult<Redemption> {
    if goal.status_enum() != GoalStatus::Completed {
        return Err(AppError::NotRedeemable(
            "Only completed goals can be redeemed".to_string(),
        ));
    }
    if goal.product_id.is_none() {
        return Err(AppError::NotRedeemable(
            "Goal is not linked to a merchant product".to_string(),
        ));
    }

    Ok(Redemption {
        amount: goal.current_amount,
        merchant: credit(merchant_balance, goal.current_amount)?,
    })
}

/// Place a payout hold: the merchant balance is debited the moment the
/// request is made, not when it is approved.
pub fn request_payout(merchant_balance: Decimal, amount: Decimal) -> AppResult<Transition> {
    debit(merchant_balance, amount)
}

/// Compensate a rejected payout: restore exactly the amount held at request
/// time. Paired 1:1 with the original debit.
pub fn reject_payout(merchant_balance: Decimal, amount: Decimal) -> AppResult<Transition> {
    credit(merchant_balance, amount)
}
