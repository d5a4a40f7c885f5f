use super::at_path;
use super::auth::AuthSession;
use super::error_handling::{LogHelper, MinerStatsError};
use crate::domain::{DigitalCurrencyAmount, Pool, PoolWallets};
use crate::repository::{paths, DatabaseAdaptor};
use crate::rx::{combine_latest2, Feed, SharedFeeds};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Fetches a pool account balance from the balance API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceClient: Send + Sync {
    async fn balance(&self, pool: Pool, id_token: &str) -> Result<DigitalCurrencyAmount>;
}

pub struct HttpBalanceClient {
    client: reqwest::Client,
    api_endpoint: String,
}

impl HttpBalanceClient {
    pub fn new(api_endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_endpoint = api_endpoint.into();
        if !(api_endpoint.starts_with("http://") || api_endpoint.starts_with("https://")) {
            return Err(MinerStatsError::Configuration {
                message: format!("api_endpoint must be an http(s) URL, got {api_endpoint:?}"),
            }
            .into());
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building balance HTTP client")?;
        Ok(Self {
            client,
            api_endpoint,
        })
    }

    pub fn balance_url(&self, pool: Pool) -> String {
        format!("{}balance/{}/BTC", self.api_endpoint, pool)
    }
}

#[async_trait]
impl BalanceClient for HttpBalanceClient {
    async fn balance(&self, pool: Pool, id_token: &str) -> Result<DigitalCurrencyAmount> {
        let response = self
            .client
            .get(self.balance_url(pool))
            .bearer_auth(id_token)
            .send()
            .await
            .map_err(|err| MinerStatsError::BalanceRequest {
                pool,
                message: err.to_string(),
            })?;

        let response = response
            .error_for_status()
            .map_err(|err| MinerStatsError::BalanceRequest {
                pool,
                message: err.to_string(),
            })?;

        Ok(response.json::<DigitalCurrencyAmount>().await?)
    }
}

/// Wallets configured by the user and their balances.
#[derive(Clone)]
pub struct WalletsService {
    adaptor: DatabaseAdaptor,
    auth: AuthSession,
    client: Arc<dyn BalanceClient>,
    wallets: SharedFeeds<(), Option<PoolWallets>>,
}

impl WalletsService {
    pub fn new(adaptor: DatabaseAdaptor, auth: AuthSession, client: Arc<dyn BalanceClient>) -> Self {
        Self {
            adaptor,
            auth,
            client,
            wallets: SharedFeeds::new(),
        }
    }

    fn wallets(&self) -> Feed<Option<PoolWallets>> {
        let adaptor = self.adaptor.clone();
        let uid = self.auth.user_id();
        self.wallets.share((), move || {
            uid.switch_map(move |uid| {
                at_path(paths::user_pool_wallets(&uid), |path| adaptor.object(&path))
            })
        })
    }

    /// Pools with a wallet entry; `None` when the user has no wallets at all.
    pub fn available_wallets(&self) -> Feed<Option<Vec<Pool>>> {
        self.wallets().map(|wallets| {
            wallets.map(|wallets| {
                wallets
                    .keys()
                    .filter_map(|name| match name.parse::<Pool>() {
                        Ok(pool) => Some(pool),
                        Err(err) => {
                            debug!(error = %err, "skipping wallet for unknown pool");
                            None
                        }
                    })
                    .collect()
            })
        })
    }

    /// Balance of the user's account at `pool`. Only ahashpool exposes one;
    /// every other pool, and every failed request, reads as zero BTC.
    pub fn wallet_balance(&self, pool: Pool) -> Feed<DigitalCurrencyAmount> {
        if pool != Pool::Ahashpool {
            return Feed::constant(DigitalCurrencyAmount::zero_btc());
        }

        let client = self.client.clone();
        combine_latest2(self.wallets(), self.auth.id_token(), |wallets, token| {
            (wallets.is_some(), token.clone())
        })
        .switch_map(move |(has_wallets, token)| {
            if !has_wallets {
                return Feed::constant(DigitalCurrencyAmount::zero_btc());
            }
            let client = client.clone();
            Feed::from_future(async move {
                match client.balance(pool, &token).await {
                    Ok(balance) => balance,
                    Err(err) => {
                        LogHelper::log_fallback("wallet_balance", &err);
                        DigitalCurrencyAmount::zero_btc()
                    }
                }
            })
        })
    }
}
