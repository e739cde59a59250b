//! Append-only audit trail writes.
//!
//! `record` participates in the caller's unit of work so the audit row
//! commits (or rolls back) with the financial mutation it describes.
//! `record_best_effort` is for actions outside a unit: a failure to audit is
//! logged, never propagated.

use crate::error::RepositoryError;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::error;
use uuid::Uuid;

/// Input for one audit entry
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: &'static str,
    pub resource: &'static str,
    pub resource_id: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an audit entry outside a unit of work; failures are swallowed
    pub async fn record_best_effort(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(e) = Self::insert(&self.pool, entry).await {
            error!(action, error = %e, "failed to record audit log");
        }
    }

    /// Record an audit entry inside the current unit of work
    pub async fn record(
        conn: &mut PgConnection,
        entry: AuditEntry,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, resource, resource_id, old_value, new_value)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.resource)
        .bind(entry.resource_id)
        .bind(entry.old_value)
        .bind(entry.new_value)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn insert(pool: &PgPool, entry: AuditEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, resource, resource_id, old_value, new_value)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.resource)
        .bind(entry.resource_id)
        .bind(entry.old_value)
        .bind(entry.new_value)
        .execute(pool)
        .await?;

        Ok(())
    }
}
