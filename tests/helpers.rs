use rust_decimal::Decimal;
use std::sync::Arc;
use susu_backend::config::DatabaseConfig;
use susu_backend::database::{create_pool, run_migrations};
use susu_backend::models::{MerchantProfile, Product};
use susu_backend::services::LogNotifier;
use susu_backend::AppState;
use uuid::Uuid;

/// Test database harness. Connects with `TEST_DATABASE_URL`; tests call
/// [`TestDatabase::connect`] and return early when the variable is unset so
/// the suite passes on machines without a PostgreSQL instance.
pub struct TestDatabase {
    pub state: AppState,
}

impl TestDatabase {
    pub async fn connect() -> Option<Self> {
        let database_url = std::env::var("TEST_DATABASE_URL").ok()?;

        let config = DatabaseConfig {
            url: database_url,
            max_connections: 5,
            acquire_timeout_secs: 10,
            idle_timeout_secs: 300,
            max_lifetime_secs: 600,
            test_before_acquire: true,
        };

        let pool = create_pool(&config)
            .await
            .expect("Failed to create test database pool");

        // Run migrations
        run_migrations(&pool, None)
            .await
            .expect("Failed to run migrations");

        let state = AppState::new(pool, Arc::new(LogNotifier));

        Some(Self { state })
    }

    /// Create a merchant with one priced product. Tests use fresh user ids
    /// throughout, so suites can run concurrently against one database.
    pub async fn seed_merchant_with_product(
        &self,
        price: Decimal,
    ) -> (MerchantProfile, Product) {
        let merchant_user = Uuid::new_v4();

        // Merchants hold a wallet too; redemption records it on the payout row
        self.state
            .wallet_repo
            .get_or_create(merchant_user)
            .await
            .expect("Failed to create merchant wallet");

        let merchant = self
            .state
            .merchant_repo
            .create(
                merchant_user,
                Some("Access Bank"),
                Some("0012345678"),
                Some("Susu Merchant Ltd"),
            )
            .await
            .expect("Failed to create merchant");

        let product = self
            .state
            .product_repo
            .create(merchant.id, "55\" Smart TV", price)
            .await
            .expect("Failed to create product");

        (merchant, product)
    }

    /// Set a merchant balance directly (redemptions are the only in-core
    /// path that credits one)
    pub async fn set_merchant_balance(&self, merchant_id: Uuid, balance: Decimal) {
        sqlx::query("UPDATE merchant_profiles SET balance = $2 WHERE id = $1")
            .bind(merchant_id)
            .bind(balance)
            .execute(self.state.database.pool())
            .await
            .expect("Failed to set merchant balance");
    }

    /// Force a goal status (cancellation happens outside the ledger core)
    pub async fn set_goal_status(&self, goal_id: Uuid, status: &str) {
        sqlx::query("UPDATE goals SET status = $2 WHERE id = $1")
            .bind(goal_id)
            .bind(status)
            .execute(self.state.database.pool())
            .await
            .expect("Failed to set goal status");
    }

    /// Count ledger rows of one type attached to a goal
    pub async fn count_goal_transactions(&self, goal_id: Uuid, tx_type: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM transactions WHERE goal_id = $1 AND transaction_type = $2",
        )
        .bind(goal_id)
        .bind(tx_type)
        .fetch_one(self.state.database.pool())
        .await
        .expect("Failed to count transactions")
    }

    /// Count audit entries for a user and action
    pub async fn count_audit_entries(&self, user_id: Uuid, action: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM audit_logs WHERE user_id = $1 AND action = $2",
        )
        .bind(user_id)
        .bind(action)
        .fetch_one(self.state.database.pool())
        .await
        .expect("Failed to count audit entries")
    }
}
