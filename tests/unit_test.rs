use chrono::NaiveDate;
use rust_decimal::Decimal;
use susu_backend::error::AppError;
use susu_backend::ledger::transitions;
use susu_backend::models::*;
use susu_backend::services::automation::{auto_debit_reference, day_to_match, month_start};
use susu_backend::services::notifier::{
    dispatch, Notification, NotificationCategory, NotificationChannel, NotificationSink,
    NotifyError,
};
use uuid::Uuid;

fn sample_goal(current: Decimal, target: Decimal, status: GoalStatus) -> Goal {
    let now = chrono::Utc::now().naive_utc();
    Goal {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        name: "New phone".to_string(),
        description: None,
        target_amount: target,
        current_amount: current,
        status: status.as_str().to_string(),
        product_id: None,
        is_recurring: false,
        monthly_amount: None,
        savings_day: None,
        last_auto_debit_date: None,
        deadline: None,
        created_at: now,
        updated_at: now,
    }
}

fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

// ============================================================================
// Wallet credit/debit transitions
// ============================================================================

#[test]
fn test_credit_computes_snapshot_pair() {
    let t = transitions::credit(dec(100), dec(40)).unwrap();
    assert_eq!(t.balance_before, dec(100));
    assert_eq!(t.balance_after, dec(140));
    assert_eq!(t.delta(), dec(40));
}

#[test]
fn test_debit_computes_snapshot_pair() {
    let t = transitions::debit(dec(100), dec(40)).unwrap();
    assert_eq!(t.balance_before, dec(100));
    assert_eq!(t.balance_after, dec(60));
    assert_eq!(t.delta(), dec(-40));
}

#[test]
fn test_zero_and_negative_amounts_rejected() {
    assert!(matches!(
        transitions::credit(dec(100), Decimal::ZERO),
        Err(AppError::InvalidAmount(_))
    ));
    assert!(matches!(
        transitions::debit(dec(100), dec(-5)),
        Err(AppError::InvalidAmount(_))
    ));
}

#[test]
fn test_debit_never_goes_negative() {
    let err = transitions::debit(dec(50), dec(100)).unwrap_err();
    match err {
        AppError::InsufficientBalance { available, required } => {
            assert_eq!(available, dec(50));
            assert_eq!(required, dec(100));
        }
        other => panic!("expected InsufficientBalance, got {:?}", other),
    }

    // Exact balance is spendable
    let t = transitions::debit(dec(50), dec(50)).unwrap();
    assert_eq!(t.balance_after, Decimal::ZERO);
}

// ============================================================================
// Goal funding
// ============================================================================

#[test]
fn test_fund_goal_conserves_total() {
    let goal = sample_goal(dec(300), dec(2000), GoalStatus::Active);
    let wallet_balance = dec(1000);
    let amount = dec(250);

    let funding = transitions::fund_goal(&goal, wallet_balance, amount).unwrap();

    assert_eq!(funding.wallet.balance_after, wallet_balance - amount);
    assert_eq!(funding.goal_amount_after, goal.current_amount + amount);
    // Money moved, none created or destroyed
    assert_eq!(
        funding.wallet.balance_after + funding.goal_amount_after,
        wallet_balance + goal.current_amount
    );
    assert_eq!(funding.status_after, GoalStatus::Active);
}

#[test]
fn test_fund_goal_completion_threshold_with_overshoot() {
    // 1900/2000 funded with 150 completes at 2050; the overshoot stands
    let goal = sample_goal(dec(1900), dec(2000), GoalStatus::Active);

    let funding = transitions::fund_goal(&goal, dec(500), dec(150)).unwrap();

    assert_eq!(funding.goal_amount_after, dec(2050));
    assert_eq!(funding.status_after, GoalStatus::Completed);
    assert!(funding.completes());
}

#[test]
fn test_fund_goal_exact_target_completes() {
    let goal = sample_goal(dec(1900), dec(2000), GoalStatus::Active);
    let funding = transitions::fund_goal(&goal, dec(500), dec(100)).unwrap();
    assert_eq!(funding.goal_amount_after, dec(2000));
    assert!(funding.completes());
}

#[test]
fn test_fund_goal_requires_active_status() {
    for status in [
        GoalStatus::Completed,
        GoalStatus::Archived,
        GoalStatus::Cancelled,
    ] {
        let goal = sample_goal(dec(0), dec(100), status);
        assert!(matches!(
            transitions::fund_goal(&goal, dec(1000), dec(10)),
            Err(AppError::GoalNotActive(_))
        ));
    }
}

#[test]
fn test_fund_goal_insufficient_wallet_balance() {
    let goal = sample_goal(dec(0), dec(2000), GoalStatus::Active);
    assert!(matches!(
        transitions::fund_goal(&goal, dec(50), dec(100)),
        Err(AppError::InsufficientBalance { .. })
    ));
}

// ============================================================================
// Goal withdrawal (reclaim)
// ============================================================================

#[test]
fn test_withdraw_from_goal_defaults_to_full_balance() {
    let goal = sample_goal(dec(750), dec(2000), GoalStatus::Active);
    let withdrawal = transitions::withdraw_from_goal(&goal, dec(100), None).unwrap();

    assert_eq!(withdrawal.amount, dec(750));
    assert_eq!(withdrawal.goal_amount_after, Decimal::ZERO);
    assert_eq!(withdrawal.wallet.balance_after, dec(850));
}

#[test]
fn test_withdraw_from_goal_partial_conserves_total() {
    let goal = sample_goal(dec(750), dec(2000), GoalStatus::Active);
    let withdrawal = transitions::withdraw_from_goal(&goal, dec(100), Some(dec(200))).unwrap();

    assert_eq!(withdrawal.goal_amount_after, dec(550));
    assert_eq!(
        withdrawal.wallet.balance_after + withdrawal.goal_amount_after,
        dec(100) + dec(750)
    );
}

#[test]
fn test_withdraw_from_goal_rejects_overdraw() {
    let goal = sample_goal(dec(100), dec(2000), GoalStatus::Active);
    let err = transitions::withdraw_from_goal(&goal, dec(0), Some(dec(150))).unwrap_err();
    match err {
        AppError::InsufficientGoalBalance { available, required } => {
            assert_eq!(available, dec(100));
            assert_eq!(required, dec(150));
        }
        other => panic!("expected InsufficientGoalBalance, got {:?}", other),
    }
}

#[test]
fn test_withdraw_from_completed_goal_reverts_to_active() {
    let goal = sample_goal(dec(2050), dec(2000), GoalStatus::Completed);
    let withdrawal = transitions::withdraw_from_goal(&goal, dec(0), Some(dec(500))).unwrap();

    assert_eq!(withdrawal.goal_amount_after, dec(1550));
    assert_eq!(withdrawal.status_after, GoalStatus::Active);
}

#[test]
fn test_withdraw_from_completed_goal_above_target_stays_completed() {
    // Withdrawing only the overshoot keeps the goal redeemable
    let goal = sample_goal(dec(2050), dec(2000), GoalStatus::Completed);
    let withdrawal = transitions::withdraw_from_goal(&goal, dec(0), Some(dec(50))).unwrap();

    assert_eq!(withdrawal.goal_amount_after, dec(2000));
    assert_eq!(withdrawal.status_after, GoalStatus::Completed);
}

#[test]
fn test_withdraw_from_archived_goal_rejected() {
    let goal = sample_goal(dec(500), dec(500), GoalStatus::Archived);
    assert!(matches!(
        transitions::withdraw_from_goal(&goal, dec(0), None),
        Err(AppError::GoalNotActive(_))
    ));
}

// ============================================================================
// Redemption
// ============================================================================

#[test]
fn test_redeem_pays_merchant_full_saved_amount() {
    let mut goal = sample_goal(dec(2050), dec(2000), GoalStatus::Completed);
    goal.product_id = Some(Uuid::new_v4());

    let redemption = transitions::redeem_goal(&goal, dec(100)).unwrap();

    // Overshoot included
    assert_eq!(redemption.amount, dec(2050));
    assert_eq!(redemption.merchant.balance_before, dec(100));
    assert_eq!(redemption.merchant.balance_after, dec(2150));
}

#[test]
fn test_redeem_requires_completed_status() {
    let mut goal = sample_goal(dec(500), dec(2000), GoalStatus::Active);
    goal.product_id = Some(Uuid::new_v4());
    assert!(matches!(
        transitions::redeem_goal(&goal, dec(0)),
        Err(AppError::NotRedeemable(_))
    ));
}

#[test]
fn test_redeem_requires_linked_product() {
    let goal = sample_goal(dec(2000), dec(2000), GoalStatus::Completed);
    assert!(matches!(
        transitions::redeem_goal(&goal, dec(0)),
        Err(AppError::NotRedeemable(_))
    ));
}

// ============================================================================
// Payout hold and compensation
// ============================================================================

#[test]
fn test_payout_hold_and_reject_restore_pair() {
    // Request reserves the funds immediately
    let hold = transitions::request_payout(dec(500), dec(500)).unwrap();
    assert_eq!(hold.balance_before, dec(500));
    assert_eq!(hold.balance_after, Decimal::ZERO);

    // Rejection restores exactly the held amount
    let restore = transitions::reject_payout(hold.balance_after, dec(500)).unwrap();
    assert_eq!(restore.balance_after, dec(500));
    assert_eq!(restore.delta(), -hold.delta());
}

#[test]
fn test_payout_request_exceeding_balance_rejected() {
    assert!(matches!(
        transitions::request_payout(dec(100), dec(500)),
        Err(AppError::InsufficientBalance { .. })
    ));
}

// ============================================================================
// Automation scheduling rules
// ============================================================================

#[test]
fn test_day_to_match_caps_at_28() {
    let jan_31 = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
    let feb_15 = NaiveDate::from_ymd_opt(2026, 2, 15).unwrap();
    let apr_28 = NaiveDate::from_ymd_opt(2026, 4, 28).unwrap();

    assert_eq!(day_to_match(jan_31), 28);
    assert_eq!(day_to_match(feb_15), 15);
    assert_eq!(day_to_match(apr_28), 28);
}

#[test]
fn test_month_start_cutoff() {
    let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
    let cutoff = month_start(date);
    assert_eq!(cutoff.date(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());

    // A debit stamped in February falls before the March cutoff
    let last_debit = NaiveDate::from_ymd_opt(2026, 2, 15)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert!(last_debit < cutoff);

    // One stamped earlier in March does not
    let this_month = NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    assert!(this_month >= cutoff);
}

#[test]
fn test_auto_debit_reference_is_stable_per_goal_and_day() {
    let goal_id = Uuid::new_v4();
    let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();

    let a = auto_debit_reference(goal_id, date);
    let b = auto_debit_reference(goal_id, date);
    assert_eq!(a, b);
    assert_eq!(a, format!("AUTO-{}-2026-03-15", goal_id));

    // A different day or goal produces a different key
    let next_month = NaiveDate::from_ymd_opt(2026, 4, 15).unwrap();
    assert_ne!(a, auto_debit_reference(goal_id, next_month));
    assert_ne!(a, auto_debit_reference(Uuid::new_v4(), date));
}

// ============================================================================
// Model conversions
// ============================================================================

#[test]
fn test_goal_status_conversion() {
    assert_eq!(GoalStatus::Active.as_str(), "ACTIVE");
    assert_eq!(GoalStatus::from_str("COMPLETED").unwrap(), GoalStatus::Completed);
    assert_eq!(GoalStatus::from_str("ARCHIVED").unwrap(), GoalStatus::Archived);
    assert!(GoalStatus::from_str("PAUSED").is_err());
}

#[test]
fn test_transaction_type_conversion() {
    for tx_type in [
        TransactionType::Deposit,
        TransactionType::Withdrawal,
        TransactionType::GoalFunding,
        TransactionType::GoalWithdrawal,
        TransactionType::AutomatedSavings,
        TransactionType::MerchantPayout,
    ] {
        assert_eq!(TransactionType::from_str(tx_type.as_str()), Some(tx_type));
    }
    assert_eq!(TransactionType::from_str("REFUND"), None);
}

#[test]
fn test_transaction_status_conversion() {
    for status in [
        TransactionStatus::Pending,
        TransactionStatus::Completed,
        TransactionStatus::Failed,
        TransactionStatus::Cancelled,
    ] {
        assert_eq!(TransactionStatus::from_str(status.as_str()), Some(status));
    }
}

#[test]
fn test_goal_remaining() {
    let goal = sample_goal(dec(1900), dec(2000), GoalStatus::Active);
    assert_eq!(goal.remaining(), dec(100));

    let overshot = sample_goal(dec(2050), dec(2000), GoalStatus::Completed);
    assert_eq!(overshot.remaining(), Decimal::ZERO);
}

// ============================================================================
// Notification dispatch
// ============================================================================

struct FailingSink;

#[async_trait::async_trait]
impl NotificationSink for FailingSink {
    async fn deliver(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("provider down".to_string()))
    }
}

#[test]
fn test_dispatch_swallows_sink_failures() {
    // A failing sink must never surface as an operation failure
    tokio_test::block_on(dispatch(
        &FailingSink,
        Notification {
            user_id: Uuid::new_v4(),
            title: "Deposit Successful".to_string(),
            message: "Your deposit of 100 GHS was successful.".to_string(),
            category: NotificationCategory::Transaction,
            channels: vec![NotificationChannel::InApp],
        },
    ));
}
