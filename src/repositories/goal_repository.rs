//! Repository for savings goal data access

use crate::error::RepositoryError;
use crate::models::{Goal, GoalStatus};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Insert payload for a new goal
#[derive(Debug, Clone)]
pub struct NewGoal {
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub target_amount: Decimal,
    pub product_id: Option<Uuid>,
    pub is_recurring: bool,
    pub monthly_amount: Option<Decimal>,
    pub savings_day: Option<i32>,
    pub deadline: Option<NaiveDateTime>,
}

pub struct GoalRepository {
    pool: PgPool,
}

impl GoalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new ACTIVE goal
    pub async fn create(&self, new: NewGoal) -> Result<Goal, RepositoryError> {
        let goal = sqlx::query_as::<_, Goal>(
            r#"
            INSERT INTO goals
                (user_id, name, description, target_amount, product_id,
                 is_recurring, monthly_amount, savings_day, deadline, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'ACTIVE')
            RETURNING id, user_id, name, description, target_amount, current_amount,
                      status, product_id, is_recurring, monthly_amount, savings_day,
                      last_auto_debit_date, deadline, created_at, updated_at
            "#,
        )
        .bind(new.user_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.target_amount)
        .bind(new.product_id)
        .bind(new.is_recurring)
        .bind(new.monthly_amount)
        .bind(new.savings_day)
        .bind(new.deadline)
        .fetch_one(&self.pool)
        .await?;

        Ok(goal)
    }

    /// Find a goal by id
    pub async fn find_by_id(&self, goal_id: Uuid) -> Result<Option<Goal>, RepositoryError> {
        let goal = sqlx::query_as::<_, Goal>(
            r#"
            SELECT id, user_id, name, description, target_amount, current_amount,
                   status, product_id, is_recurring, monthly_amount, savings_day,
                   last_auto_debit_date, deadline, created_at, updated_at
            FROM goals
            WHERE id = $1
            "#,
        )
        .bind(goal_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(goal)
    }

    /// List a user's goals, newest first
    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Goal>, RepositoryError> {
        let goals = sqlx::query_as::<_, Goal>(
            r#"
            SELECT id, user_id, name, description, target_amount, current_amount,
                   status, product_id, is_recurring, monthly_amount, savings_day,
                   last_auto_debit_date, deadline, created_at, updated_at
            FROM goals
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(goals)
    }

    /// Update recurring-debit settings on a goal
    pub async fn update_recurring(
        &self,
        goal_id: Uuid,
        is_recurring: bool,
        monthly_amount: Option<Decimal>,
        savings_day: Option<i32>,
    ) -> Result<Goal, RepositoryError> {
        let goal = sqlx::query_as::<_, Goal>(
            r#"
            UPDATE goals
            SET is_recurring = $2, monthly_amount = $3, savings_day = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, name, description, target_amount, current_amount,
                      status, product_id, is_recurring, monthly_amount, savings_day,
                      last_auto_debit_date, deadline, created_at, updated_at
            "#,
        )
        .bind(goal_id)
        .bind(is_recurring)
        .bind(monthly_amount)
        .bind(savings_day)
        .fetch_one(&self.pool)
        .await?;

        Ok(goal)
    }

    /// Select goals due for an automated debit on the given day-of-month.
    /// The month-start cutoff excludes goals already charged this month.
    pub async fn find_due_for_auto_debit(
        &self,
        day_to_match: i32,
        month_start: NaiveDateTime,
    ) -> Result<Vec<Goal>, RepositoryError> {
        let goals = sqlx::query_as::<_, Goal>(
            r#"
            SELECT id, user_id, name, description, target_amount, current_amount,
                   status, product_id, is_recurring, monthly_amount, savings_day,
                   last_auto_debit_date, deadline, created_at, updated_at
            FROM goals
            WHERE is_recurring = TRUE
              AND status = 'ACTIVE'
              AND savings_day = $1
              AND monthly_amount IS NOT NULL
              AND (last_auto_debit_date IS NULL OR last_auto_debit_date < $2)
            ORDER BY created_at
            "#,
        )
        .bind(day_to_match)
        .bind(month_start)
        .fetch_all(&self.pool)
        .await?;

        Ok(goals)
    }

    // =========================================================================
    // Unit-of-work operations (run on the executor's connection)
    // =========================================================================

    /// Read a goal with a row lock, serializing concurrent units
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        goal_id: Uuid,
    ) -> Result<Option<Goal>, RepositoryError> {
        let goal = sqlx::query_as::<_, Goal>(
            r#"
            SELECT id, user_id, name, description, target_amount, current_amount,
                   status, product_id, is_recurring, monthly_amount, savings_day,
                   last_auto_debit_date, deadline, created_at, updated_at
            FROM goals
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(goal_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(goal)
    }

    /// Write a goal's saved amount and status inside the current unit
    pub async fn apply_funding(
        conn: &mut PgConnection,
        goal_id: Uuid,
        current_amount: Decimal,
        status: GoalStatus,
    ) -> Result<Goal, RepositoryError> {
        let goal = sqlx::query_as::<_, Goal>(
            r#"
            UPDATE goals
            SET current_amount = $2, status = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, name, description, target_amount, current_amount,
                      status, product_id, is_recurring, monthly_amount, savings_day,
                      last_auto_debit_date, deadline, created_at, updated_at
            "#,
        )
        .bind(goal_id)
        .bind(current_amount)
        .bind(status.as_str())
        .fetch_one(&mut *conn)
        .await?;

        Ok(goal)
    }

    /// Funding write that also stamps the automated-debit date
    pub async fn apply_auto_debit(
        conn: &mut PgConnection,
        goal_id: Uuid,
        current_amount: Decimal,
        status: GoalStatus,
        debited_at: NaiveDateTime,
    ) -> Result<Goal, RepositoryError> {
        let goal = sqlx::query_as::<_, Goal>(
            r#"
            UPDATE goals
            SET current_amount = $2, status = $3, last_auto_debit_date = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, name, description, target_amount, current_amount,
                      status, product_id, is_recurring, monthly_amount, savings_day,
                      last_auto_debit_date, deadline, created_at, updated_at
            "#,
        )
        .bind(goal_id)
        .bind(current_amount)
        .bind(status.as_str())
        .bind(debited_at)
        .fetch_one(&mut *conn)
        .await?;

        Ok(goal)
    }

    /// Transition a goal's status inside the current unit
    pub async fn set_status(
        conn: &mut PgConnection,
        goal_id: Uuid,
        status: GoalStatus,
    ) -> Result<Goal, RepositoryError> {
        let goal = sqlx::query_as::<_, Goal>(
            r#"
            UPDATE goals
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, name, description, target_amount, current_amount,
                      status, product_id, is_recurring, monthly_amount, savings_day,
                      last_auto_debit_date, deadline, created_at, updated_at
            "#,
        )
        .bind(goal_id)
        .bind(status.as_str())
        .fetch_one(&mut *conn)
        .await?;

        Ok(goal)
    }
}
