//! End-to-end flows against a real PostgreSQL instance.
//!
//! Set TEST_DATABASE_URL to run; every test returns early without it. Tests
//! create their own users with fresh ids, so they are safe to run in
//! parallel and do not truncate shared tables.

mod helpers;

use helpers::TestDatabase;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use susu_backend::error::AppError;
use susu_backend::models::{GoalStatus, TransactionStatus, TransactionType};
use susu_backend::services::goal_service::CreateGoalInput;
use uuid::Uuid;

fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

fn goal_input(name: &str, target: i64) -> CreateGoalInput {
    CreateGoalInput {
        name: name.to_string(),
        target_amount: Some(dec(target)),
        ..Default::default()
    }
}

// ============================================================================
// Wallet flows
// ============================================================================

#[tokio::test]
async fn test_wallet_lazy_creation_and_deposit() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user = Uuid::new_v4();

    // First access creates a zero-balance GHS wallet
    let wallet = db.state.wallet_service.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);
    assert_eq!(wallet.currency, "GHS");

    let (wallet, tx) = db
        .state
        .wallet_service
        .deposit(user, dec(100), None)
        .await
        .unwrap();

    assert_eq!(wallet.balance, dec(100));
    assert_eq!(tx.status_enum(), Some(TransactionStatus::Completed));
    assert_eq!(tx.balance_before, Some(Decimal::ZERO));
    assert_eq!(tx.balance_after, Some(dec(100)));
    assert_eq!(db.count_audit_entries(user, "WALLET_DEPOSIT").await, 1);

    let (wallet, tx) = db
        .state
        .wallet_service
        .withdraw(user, dec(40))
        .await
        .unwrap();

    assert_eq!(wallet.balance, dec(60));
    assert_eq!(tx.tx_type(), Some(TransactionType::Withdrawal));
    assert_eq!(tx.balance_after, Some(dec(60)));
}

#[tokio::test]
async fn test_deposit_reference_applied_exactly_once() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user = Uuid::new_v4();
    let reference = format!("DEP-{}", Uuid::new_v4());

    let (wallet, first) = db
        .state
        .wallet_service
        .deposit(user, dec(100), Some(reference.clone()))
        .await
        .unwrap();
    assert_eq!(wallet.balance, dec(100));

    // Replaying the same reference is a no-op returning the original row
    let (wallet, second) = db
        .state
        .wallet_service
        .deposit(user, dec(100), Some(reference))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(wallet.balance, dec(100));
}

#[tokio::test]
async fn test_withdraw_insufficient_balance_leaves_state_untouched() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user = Uuid::new_v4();

    db.state
        .wallet_service
        .deposit(user, dec(50), None)
        .await
        .unwrap();

    let err = db
        .state
        .wallet_service
        .withdraw(user, dec(100))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance { .. }));

    // Balance unchanged, no withdrawal row written
    let wallet = db.state.wallet_service.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, dec(50));

    let history = db.state.wallet_service.transactions(user, 50).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].tx_type(), Some(TransactionType::Deposit));
}

// ============================================================================
// Goal funding and reclaim
// ============================================================================

#[tokio::test]
async fn test_goal_funding_completes_with_overshoot() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user = Uuid::new_v4();

    db.state
        .wallet_service
        .deposit(user, dec(2050), None)
        .await
        .unwrap();

    let goal = db
        .state
        .goal_service
        .create_goal(user, goal_input("New phone", 2000))
        .await
        .unwrap();
    assert_eq!(goal.status_enum(), GoalStatus::Active);

    let (goal, _) = db
        .state
        .goal_service
        .fund_goal(user, goal.id, dec(1900))
        .await
        .unwrap();
    assert_eq!(goal.current_amount, dec(1900));
    assert_eq!(goal.status_enum(), GoalStatus::Active);

    // Crossing the target completes in full; the overshoot stands
    let (goal, tx) = db
        .state
        .goal_service
        .fund_goal(user, goal.id, dec(150))
        .await
        .unwrap();
    assert_eq!(goal.current_amount, dec(2050));
    assert_eq!(goal.status_enum(), GoalStatus::Completed);
    assert_eq!(tx.balance_before, Some(dec(150)));
    assert_eq!(tx.balance_after, Some(Decimal::ZERO));

    // Conservation: everything the wallet lost, the goal gained
    let wallet = db.state.wallet_service.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance + goal.current_amount, dec(2050));
}

#[tokio::test]
async fn test_fund_goal_ownership_and_status_rules() {
    let Some(db) = TestDatabase::connect().await else { return };
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    db.state
        .wallet_service
        .deposit(owner, dec(100), None)
        .await
        .unwrap();
    db.state
        .wallet_service
        .deposit(stranger, dec(100), None)
        .await
        .unwrap();

    let goal = db
        .state
        .goal_service
        .create_goal(owner, goal_input("Laptop", 5000))
        .await
        .unwrap();

    // Someone else's goal is indistinguishable from a missing one
    let err = db
        .state
        .goal_service
        .fund_goal(stranger, goal.id, dec(10))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // Cancelled goals refuse further funding
    db.set_goal_status(goal.id, "CANCELLED").await;
    let err = db
        .state
        .goal_service
        .fund_goal(owner, goal.id, dec(10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::GoalNotActive(_)));

    let wallet = db.state.wallet_service.get_wallet(owner).await.unwrap();
    assert_eq!(wallet.balance, dec(100));
}

#[tokio::test]
async fn test_withdraw_from_goal_roundtrip() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user = Uuid::new_v4();

    db.state
        .wallet_service
        .deposit(user, dec(500), None)
        .await
        .unwrap();
    let goal = db
        .state
        .goal_service
        .create_goal(user, goal_input("Holiday", 2000))
        .await
        .unwrap();

    db.state
        .goal_service
        .fund_goal(user, goal.id, dec(500))
        .await
        .unwrap();

    // Omitted amount reclaims the full saved balance
    let (goal, tx) = db
        .state
        .goal_service
        .withdraw_from_goal(user, goal.id, None)
        .await
        .unwrap();

    assert_eq!(goal.current_amount, Decimal::ZERO);
    assert_eq!(tx.tx_type(), Some(TransactionType::GoalWithdrawal));
    assert_eq!(tx.amount, dec(500));

    let wallet = db.state.wallet_service.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, dec(500));
}

// ============================================================================
// Product-linked goals and redemption
// ============================================================================

#[tokio::test]
async fn test_product_goal_redemption_pays_merchant() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user = Uuid::new_v4();
    let (merchant, product) = db.seed_merchant_with_product(dec(1000)).await;

    // The product price overrides the client-supplied target
    let goal = db
        .state
        .goal_service
        .create_goal(
            user,
            CreateGoalInput {
                name: "Smart TV".to_string(),
                target_amount: Some(dec(5)),
                product_id: Some(product.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(goal.target_amount, dec(1000));

    db.state
        .wallet_service
        .deposit(user, dec(1000), None)
        .await
        .unwrap();
    let (goal, _) = db
        .state
        .goal_service
        .fund_goal(user, goal.id, dec(1000))
        .await
        .unwrap();
    assert_eq!(goal.status_enum(), GoalStatus::Completed);

    let (goal, tx) = db
        .state
        .goal_service
        .redeem_goal(user, goal.id)
        .await
        .unwrap();

    assert_eq!(goal.status_enum(), GoalStatus::Archived);
    assert_eq!(tx.tx_type(), Some(TransactionType::MerchantPayout));
    assert_eq!(tx.merchant_profile_id, Some(merchant.id));
    assert_eq!(tx.balance_before, Some(Decimal::ZERO));
    assert_eq!(tx.balance_after, Some(dec(1000)));

    let merchant = db
        .state
        .merchant_repo
        .find_by_id(merchant.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(merchant.balance, dec(1000));

    // A redeemed goal cannot be redeemed or funded again
    let err = db
        .state
        .goal_service
        .redeem_goal(user, goal.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotRedeemable(_)));
}

#[tokio::test]
async fn test_redeem_requires_product_link() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user = Uuid::new_v4();

    db.state
        .wallet_service
        .deposit(user, dec(100), None)
        .await
        .unwrap();
    let goal = db
        .state
        .goal_service
        .create_goal(user, goal_input("Free savings", 100))
        .await
        .unwrap();
    db.state
        .goal_service
        .fund_goal(user, goal.id, dec(100))
        .await
        .unwrap();

    let err = db
        .state
        .goal_service
        .redeem_goal(user, goal.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotRedeemable(_)));
}

// ============================================================================
// Payout workflow
// ============================================================================

#[tokio::test]
async fn test_payout_request_holds_funds_and_approval_completes() {
    let Some(db) = TestDatabase::connect().await else { return };
    let admin = Uuid::new_v4();
    let (merchant, _) = db.seed_merchant_with_product(dec(10)).await;
    db.set_merchant_balance(merchant.id, dec(500)).await;

    let tx = db
        .state
        .payout_service
        .request_payout(merchant.user_id, dec(200))
        .await
        .unwrap();

    assert_eq!(tx.status_enum(), Some(TransactionStatus::Pending));
    assert_eq!(tx.balance_before, Some(dec(500)));
    assert_eq!(tx.balance_after, Some(dec(300)));

    // Funds are held at request time
    let held = db
        .state
        .merchant_repo
        .find_by_id(merchant.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(held.balance, dec(300));

    let approved = db
        .state
        .payout_service
        .approve_payout(admin, tx.id)
        .await
        .unwrap();
    assert_eq!(approved.status_enum(), Some(TransactionStatus::Completed));

    // Approval moves no money
    let merchant = db
        .state
        .merchant_repo
        .find_by_id(merchant.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(merchant.balance, dec(300));
    assert_eq!(db.count_audit_entries(admin, "PAYOUT_APPROVED").await, 1);

    // A terminal payout cannot be processed twice
    let err = db
        .state
        .payout_service
        .approve_payout(admin, tx.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyProcessed(_)));
}

#[tokio::test]
async fn test_payout_reject_restores_balance() {
    let Some(db) = TestDatabase::connect().await else { return };
    let admin = Uuid::new_v4();
    let (merchant, _) = db.seed_merchant_with_product(dec(10)).await;
    db.set_merchant_balance(merchant.id, dec(500)).await;

    let tx = db
        .state
        .payout_service
        .request_payout(merchant.user_id, dec(500))
        .await
        .unwrap();

    let held = db
        .state
        .merchant_repo
        .find_by_id(merchant.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(held.balance, Decimal::ZERO);

    let rejected = db
        .state
        .payout_service
        .reject_payout(admin, tx.id, "Bank details invalid")
        .await
        .unwrap();

    assert_eq!(rejected.status_enum(), Some(TransactionStatus::Failed));
    assert_eq!(
        rejected.metadata.as_ref().unwrap()["rejectionReason"],
        "Bank details invalid"
    );

    // The compensating credit restores exactly the held amount
    let merchant = db
        .state
        .merchant_repo
        .find_by_id(merchant.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(merchant.balance, dec(500));
}

#[tokio::test]
async fn test_payout_request_exceeding_balance_rejected() {
    let Some(db) = TestDatabase::connect().await else { return };
    let (merchant, _) = db.seed_merchant_with_product(dec(10)).await;
    db.set_merchant_balance(merchant.id, dec(100)).await;

    let err = db
        .state
        .payout_service
        .request_payout(merchant.user_id, dec(500))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance { .. }));

    let merchant = db
        .state
        .merchant_repo
        .find_by_id(merchant.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(merchant.balance, dec(100));
}

// ============================================================================
// Recurring-debit automation
// ============================================================================

#[tokio::test]
async fn test_automation_charges_once_per_month() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user = Uuid::new_v4();
    let march_15 = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
    let april_15 = NaiveDate::from_ymd_opt(2026, 4, 15).unwrap();

    db.state
        .wallet_service
        .deposit(user, dec(200), None)
        .await
        .unwrap();

    let goal = db
        .state
        .goal_service
        .create_goal(
            user,
            CreateGoalInput {
                name: "Recurring pot".to_string(),
                target_amount: Some(dec(1000)),
                is_recurring: true,
                monthly_amount: Some(dec(50)),
                savings_day: Some(15),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    db.state.automation.run_for_date(march_15).await.unwrap();

    let charged = db.state.goal_repo.find_by_id(goal.id).await.unwrap().unwrap();
    assert_eq!(charged.current_amount, dec(50));
    assert_eq!(
        charged.last_auto_debit_date.map(|d| d.date()),
        Some(march_15)
    );

    // Re-running the batch for the same day must not double-charge
    db.state.automation.run_for_date(march_15).await.unwrap();

    let still = db.state.goal_repo.find_by_id(goal.id).await.unwrap().unwrap();
    assert_eq!(still.current_amount, dec(50));
    assert_eq!(
        db.count_goal_transactions(goal.id, "AUTOMATED_SAVINGS").await,
        1
    );

    let wallet = db.state.wallet_service.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, dec(150));

    // Next month is a fresh debit opportunity
    db.state.automation.run_for_date(april_15).await.unwrap();
    assert_eq!(
        db.count_goal_transactions(goal.id, "AUTOMATED_SAVINGS").await,
        2
    );
}

#[tokio::test]
async fn test_automation_isolates_per_goal_failures() {
    let Some(db) = TestDatabase::connect().await else { return };
    let funded_user = Uuid::new_v4();
    let broke_user = Uuid::new_v4();
    let june_3 = NaiveDate::from_ymd_opt(2026, 6, 3).unwrap();

    db.state
        .wallet_service
        .deposit(funded_user, dec(100), None)
        .await
        .unwrap();
    db.state
        .wallet_service
        .deposit(broke_user, dec(10), None)
        .await
        .unwrap();

    let make_goal = || CreateGoalInput {
        name: "June saver".to_string(),
        target_amount: Some(dec(1000)),
        is_recurring: true,
        monthly_amount: Some(dec(50)),
        savings_day: Some(3),
        ..Default::default()
    };

    let healthy = db
        .state
        .goal_service
        .create_goal(funded_user, make_goal())
        .await
        .unwrap();
    let starved = db
        .state
        .goal_service
        .create_goal(broke_user, make_goal())
        .await
        .unwrap();

    let summary = db.state.automation.run_for_date(june_3).await.unwrap();

    // One goal's insufficient balance never aborts the batch
    assert!(summary.success >= 1);
    assert!(summary
        .errors
        .iter()
        .any(|failure| failure.goal_id == starved.id));

    let healthy = db
        .state
        .goal_repo
        .find_by_id(healthy.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(healthy.current_amount, dec(50));

    let starved = db
        .state
        .goal_repo
        .find_by_id(starved.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(starved.current_amount, Decimal::ZERO);
    assert!(starved.last_auto_debit_date.is_none());
}

// ============================================================================
// Gateway-backed payments
// ============================================================================

#[tokio::test]
async fn test_gateway_deposit_fulfillment_is_replay_safe() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user = Uuid::new_v4();

    let pending = db
        .state
        .payment_service
        .initiate_deposit(user, dec(300))
        .await
        .unwrap();
    assert_eq!(pending.status_enum(), Some(TransactionStatus::Pending));

    // No balance effect until the gateway confirms
    let wallet = db.state.wallet_service.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);

    let fulfilled = db
        .state
        .payment_service
        .fulfill_payment(&pending.reference)
        .await
        .unwrap();
    assert_eq!(fulfilled.status_enum(), Some(TransactionStatus::Completed));
    assert_eq!(fulfilled.balance_before, Some(Decimal::ZERO));
    assert_eq!(fulfilled.balance_after, Some(dec(300)));

    // Webhook retries are no-ops
    let replayed = db
        .state
        .payment_service
        .fulfill_payment(&pending.reference)
        .await
        .unwrap();
    assert_eq!(replayed.id, fulfilled.id);

    let wallet = db.state.wallet_service.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, dec(300));
}

#[tokio::test]
async fn test_gateway_goal_funding_fails_for_closed_goal() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user = Uuid::new_v4();

    let goal = db
        .state
        .goal_service
        .create_goal(user, goal_input("In flight", 400))
        .await
        .unwrap();

    let pending = db
        .state
        .payment_service
        .initiate_goal_funding(user, goal.id, dec(100))
        .await
        .unwrap();

    // The goal closes while the charge is in flight
    db.set_goal_status(goal.id, "CANCELLED").await;

    let settled = db
        .state
        .payment_service
        .fulfill_payment(&pending.reference)
        .await
        .unwrap();
    assert_eq!(settled.status_enum(), Some(TransactionStatus::Failed));

    let goal = db.state.goal_repo.find_by_id(goal.id).await.unwrap().unwrap();
    assert_eq!(goal.current_amount, Decimal::ZERO);
}

#[tokio::test]
async fn test_gateway_payment_failure_applies_no_balance() {
    let Some(db) = TestDatabase::connect().await else { return };
    let user = Uuid::new_v4();

    let pending = db
        .state
        .payment_service
        .initiate_deposit(user, dec(250))
        .await
        .unwrap();

    let failed = db
        .state
        .payment_service
        .fail_payment(&pending.reference, "Charge declined")
        .await
        .unwrap();
    assert_eq!(failed.status_enum(), Some(TransactionStatus::Failed));

    // A failed charge can no longer be fulfilled
    let unchanged = db
        .state
        .payment_service
        .fulfill_payment(&pending.reference)
        .await
        .unwrap();
    assert_eq!(unchanged.status_enum(), Some(TransactionStatus::Failed));

    let wallet = db.state.wallet_service.get_wallet(user).await.unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);
}
