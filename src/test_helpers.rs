// Test helpers for integration testing

use crate::config::AppConfig;
use crate::dashboard::Dashboard;
use crate::domain::{DigitalCurrency, DigitalCurrencyAmount, Pool};
use crate::repository::Repository;
use crate::rx::{Feed, Item};
use crate::services::{AuthSession, BalanceClient, MinerStatsError};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Balance client that answers from memory and records every request.
#[derive(Default)]
pub struct FakeBalanceClient {
    balance: Option<f64>,
    calls: Mutex<Vec<(Pool, String)>>,
}

impl FakeBalanceClient {
    pub fn returning(btc: f64) -> Self {
        Self {
            balance: Some(btc),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A client whose every request fails.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(Pool, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl BalanceClient for FakeBalanceClient {
    async fn balance(&self, pool: Pool, id_token: &str) -> Result<DigitalCurrencyAmount> {
        self.calls.lock().push((pool, id_token.to_string()));
        match self.balance {
            Some(btc) => Ok(DigitalCurrencyAmount::new(DigitalCurrency::BTC, btc)),
            None => Err(MinerStatsError::BalanceRequest {
                pool,
                message: "service unavailable".to_string(),
            }
            .into()),
        }
    }
}

pub struct TestContext {
    pub repository: Repository,
    pub auth: AuthSession,
    pub balances: Arc<FakeBalanceClient>,
    pub dashboard: Dashboard,
}

impl TestContext {
    pub fn new_for_test() -> Self {
        Self::with_tree(Value::Null)
    }

    /// A dashboard over an in-memory tree seeded with `tree`.
    pub fn with_tree(tree: Value) -> Self {
        Self::build(tree, FakeBalanceClient::returning(0.0))
    }

    pub fn build(tree: Value, balances: FakeBalanceClient) -> Self {
        let repository = Repository::from_tree(tree);
        let auth = AuthSession::new();
        let balances = Arc::new(balances);
        let config = AppConfig {
            filter_debounce_ms: 0,
            ..AppConfig::default()
        };
        let dashboard = Dashboard::with_parts(
            config,
            repository.clone(),
            auth.clone(),
            balances.clone(),
        );
        Self {
            repository,
            auth,
            balances,
            dashboard,
        }
    }

    pub fn sign_in(&self, uid: &str) {
        self.auth.sign_in(uid, format!("token-{uid}"));
    }
}

/// Next value of `feed`, failing the test after five seconds.
pub async fn next_value<T: Item>(feed: &mut Feed<T>) -> T {
    match tokio::time::timeout(Duration::from_secs(5), feed.next()).await {
        Ok(Some(Ok(value))) => value,
        Ok(Some(Err(err))) => panic!("feed failed: {}", err.message()),
        Ok(None) => panic!("feed completed without a value"),
        Err(_) => panic!("timed out waiting for a feed value"),
    }
}

/// Reads values until one satisfies `accept`.
pub async fn value_matching<T: Item, P: Fn(&T) -> bool>(feed: &mut Feed<T>, accept: P) -> T {
    loop {
        let value = next_value(feed).await;
        if accept(&value) {
            return value;
        }
    }
}
