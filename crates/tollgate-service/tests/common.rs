//! Common test utilities for tollgate integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;

use tollgate_core::{Account, UserId};
use tollgate_service::crypto::sign_payload;
use tollgate_service::{create_router, AppState, ServiceConfig, UpstreamClient};
use tollgate_store::{LedgerStore, RocksStore};

/// Webhook secret used by test harnesses.
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test";

/// Admin key used by test harnesses.
pub const TEST_ADMIN_KEY: &str = "test-admin-key";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct store access for seeding and asserting on state.
    pub store: Arc<RocksStore>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user ID for identified requests.
    pub test_user_id: UserId,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness after adjusting the default test configuration.
    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        Self::build(adjust, None)
    }

    /// Create a harness with an injected upstream client.
    pub fn with_upstream(
        adjust: impl FnOnce(&mut ServiceConfig),
        upstream: Arc<dyn UpstreamClient>,
    ) -> Self {
        Self::build(adjust, Some(upstream))
    }

    fn build(
        adjust: impl FnOnce(&mut ServiceConfig),
        upstream: Option<Arc<dyn UpstreamClient>>,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            payment_webhook_secret: Some(TEST_WEBHOOK_SECRET.into()),
            admin_api_key: Some(TEST_ADMIN_KEY.into()),
            // Generous budgets so unrelated tests never trip limits;
            // rate-limit tests lower these explicitly.
            ip_per_minute: 10_000,
            ip_burst_per_10s: 10_000,
            user_per_minute: 10_000,
            generate_per_minute: 10_000,
            ..ServiceConfig::default()
        };
        adjust(&mut config);

        let state = match upstream {
            Some(upstream) => AppState::with_upstream(Arc::clone(&store), config, upstream),
            None => AppState::new(Arc::clone(&store), config),
        };
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            store,
            _temp_dir: temp_dir,
            test_user_id,
        }
    }

    /// Seed an account for the harness user with a starting balance.
    pub fn seed_account(&self, email: &str, balance: i64) -> Account {
        let mut account = Account::new(self.test_user_id, email.into());
        account.credits_balance = balance;
        self.store
            .put_account(&account)
            .expect("Failed to seed account");
        account
    }

    /// Current stored balance for the harness user.
    pub fn balance(&self) -> i64 {
        self.store
            .get_account(&self.test_user_id)
            .expect("Failed to read account")
            .expect("Account not seeded")
            .credits_balance
    }

    /// Sign a webhook body the way the payment provider does.
    pub fn sign(&self, body: &str) -> String {
        sign_payload(body, TEST_WEBHOOK_SECRET, chrono::Utc::now().timestamp())
    }

    /// A checkout-completed event payload crediting the harness user.
    pub fn checkout_event(&self, event_id: &str, session_id: &str, credits: i64) -> String {
        serde_json::json!({
            "id": event_id,
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": session_id,
                    "mode": "payment",
                    "metadata": {
                        "user_id": self.test_user_id.to_string(),
                        "user_email": "buyer@example.com"
                    },
                    "amount_total": 500,
                    "currency": "usd",
                    "line_items": [
                        {"price_id": "price_test", "credits": credits, "quantity": 1}
                    ]
                }
            }
        })
        .to_string()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
