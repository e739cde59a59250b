use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Goal lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalStatus {
    Active,
    Completed,
    Archived,
    Cancelled,
}

impl GoalStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "ACTIVE" => Ok(GoalStatus::Active),
            "COMPLETED" => Ok(GoalStatus::Completed),
            "ARCHIVED" => Ok(GoalStatus::Archived),
            "CANCELLED" => Ok(GoalStatus::Cancelled),
            _ => Err(format!("Invalid goal status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "ACTIVE",
            GoalStatus::Completed => "COMPLETED",
            GoalStatus::Archived => "ARCHIVED",
            GoalStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Savings goal owned by a user, optionally pinned to a merchant product.
///
/// `current_amount` may exceed `target_amount`: funding that crosses the
/// target completes in full and flips the status to COMPLETED.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub status: String, // Stored as TEXT, use GoalStatus enum for type safety
    pub product_id: Option<Uuid>,
    pub is_recurring: bool,
    pub monthly_amount: Option<Decimal>,
    pub savings_day: Option<i32>,
    pub last_auto_debit_date: Option<NaiveDateTime>,
    pub deadline: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Goal {
    /// Get status as an enum
    pub fn status_enum(&self) -> GoalStatus {
        GoalStatus::from_str(&self.status).unwrap_or(GoalStatus::Active)
    }

    /// Check if the goal accepts funding
    pub fn is_active(&self) -> bool {
        self.status_enum() == GoalStatus::Active
    }

    /// Amount still missing before the target is reached
    pub fn remaining(&self) -> Decimal {
        (self.target_amount - self.current_amount).max(Decimal::ZERO)
    }
}
