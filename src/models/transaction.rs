//! Ledger entry models for fund movements

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Transaction types for fund movements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    GoalFunding,
    GoalWithdrawal,
    AutomatedSavings,
    MerchantPayout,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Withdrawal => "WITHDRAWAL",
            Self::GoalFunding => "GOAL_FUNDING",
            Self::GoalWithdrawal => "GOAL_WITHDRAWAL",
            Self::AutomatedSavings => "AUTOMATED_SAVINGS",
            Self::MerchantPayout => "MERCHANT_PAYOUT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DEPOSIT" => Some(Self::Deposit),
            "WITHDRAWAL" => Some(Self::Withdrawal),
            "GOAL_FUNDING" => Some(Self::GoalFunding),
            "GOAL_WITHDRAWAL" => Some(Self::GoalWithdrawal),
            "AUTOMATED_SAVINGS" => Some(Self::AutomatedSavings),
            "MERCHANT_PAYOUT" => Some(Self::MerchantPayout),
            _ => None,
        }
    }
}

/// Transaction lifecycle status. PENDING only for gateway-backed flows;
/// internal movements are COMPLETED at insert. Terminal once it leaves
/// PENDING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Immutable ledger entry. Financial fields (amount, balance snapshots) are
/// write-once; `balance_before`/`balance_after` snapshot the primary balance
/// the operation touched — the wallet for wallet movements, the merchant
/// balance for payout operations.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub goal_id: Option<Uuid>,
    pub merchant_profile_id: Option<Uuid>,
    pub transaction_type: String,
    pub amount: Decimal,
    pub status: String,
    pub reference: String,
    pub balance_before: Option<Decimal>,
    pub balance_after: Option<Decimal>,
    pub metadata: Option<Value>,
    pub created_at: NaiveDateTime,
}

impl LedgerTransaction {
    pub fn tx_type(&self) -> Option<TransactionType> {
        TransactionType::from_str(&self.transaction_type)
    }

    pub fn status_enum(&self) -> Option<TransactionStatus> {
        TransactionStatus::from_str(&self.status)
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending.as_str()
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed.as_str()
    }
}
