use crate::domain::{DigitalCurrencyAmount, Pool};
use crate::rx::{combine_all, Feed};
use crate::services::{pause_when_invisible, VisibilitySignal, WalletsService};
use std::collections::BTreeMap;

pub type Balances = BTreeMap<Pool, DigitalCurrencyAmount>;

/// Balance of every wallet the user has configured.
pub fn balances(wallets: &WalletsService) -> Feed<Balances> {
    let service = wallets.clone();
    wallets
        .available_wallets()
        .filter_map(|pools| pools)
        .switch_map(move |pools| {
            let feeds = pools.iter().map(|pool| service.wallet_balance(*pool)).collect();
            combine_all(feeds).map(move |amounts| pools.iter().copied().zip(amounts).collect())
        })
}

/// Wallet balances for the dashboard header; paused while hidden.
#[derive(Clone)]
pub struct WalletPanel {
    wallets: WalletsService,
    visibility: VisibilitySignal,
}

impl WalletPanel {
    pub fn new(wallets: WalletsService, visibility: VisibilitySignal) -> Self {
        Self { wallets, visibility }
    }

    pub fn balances(&self) -> Feed<Balances> {
        let wallets = self.wallets.clone();
        pause_when_invisible(&self.visibility, move || balances(&wallets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DigitalCurrency;
    use crate::repository::Repository;
    use crate::services::wallets_service::MockBalanceClient;
    use crate::services::AuthSession;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_balances_per_pool() {
        let repository = Repository::from_tree(json!({"v2": {"user": {"u1": {"pool-wallet": {
            "ahashpool": {"BTC": "1Abc"},
            "nicehash": {"BTC": "3Def"},
        }}}}}));
        let mut client = MockBalanceClient::new();
        client
            .expect_balance()
            .returning(|_, _| Ok(DigitalCurrencyAmount::new(DigitalCurrency::BTC, 0.5)));
        let service = WalletsService::new(
            repository.adaptor,
            AuthSession::signed_in("u1", "t"),
            Arc::new(client),
        );

        let result = balances(&service).first().await.unwrap().unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[&Pool::Ahashpool].amount, 0.5);
        assert_eq!(result[&Pool::Nicehash], DigitalCurrencyAmount::zero_btc());
    }
}
