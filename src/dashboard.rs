//! Wires the repository, the services and the view models together.

use crate::config::AppConfig;
use crate::repository::Repository;
use crate::rx::Feed;
use crate::services::{
    AuthSession, BalanceClient, BookmarksService, ContextService, HttpBalanceClient,
    MetricsService, RigProfileService, VisibilitySignal, WalletsService,
};
use crate::views::{Balances, ContextPanel, CurrentTable, HistoryPanel, TableOptions, WalletPanel};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// One dashboard session. Services are shared by every view it creates.
#[derive(Clone)]
pub struct Dashboard {
    pub config: AppConfig,
    pub repository: Repository,
    pub auth: AuthSession,
    pub metrics: MetricsService,
    pub rig_profiles: RigProfileService,
    pub bookmarks: BookmarksService,
    pub wallets: WalletsService,
    pub context: ContextService,
    pub visibility: VisibilitySignal,
}

impl Dashboard {
    /// Opens the configured database and talks to the configured balance API.
    pub async fn open(config: AppConfig) -> Result<Self> {
        let db_path = config.database_path.to_string_lossy().into_owned();
        let repository = Repository::open(&db_path).await?;
        let client = HttpBalanceClient::new(config.api_endpoint.clone(), config.request_timeout())?;
        info!(database = %db_path, api = %config.api_endpoint, "dashboard opened");
        Ok(Self::with_parts(config, repository, AuthSession::new(), Arc::new(client)))
    }

    pub fn with_parts(
        config: AppConfig,
        repository: Repository,
        auth: AuthSession,
        client: Arc<dyn BalanceClient>,
    ) -> Self {
        let adaptor = repository.adaptor.clone();
        Self {
            metrics: MetricsService::new(adaptor.clone()),
            rig_profiles: RigProfileService::new(adaptor.clone(), auth.clone()),
            bookmarks: BookmarksService::new(adaptor.clone(), auth.clone()),
            wallets: WalletsService::new(adaptor, auth.clone(), client),
            context: ContextService::new(),
            visibility: VisibilitySignal::new(),
            config,
            repository,
            auth,
        }
    }

    pub fn table_options(&self) -> TableOptions {
        TableOptions {
            page_size: self.config.page_size.max(1),
            filter_debounce: self.config.filter_debounce(),
            age_refresh: self.config.age_refresh(),
        }
    }

    /// The profitability table, driven by the shared filter and rig profile.
    pub fn current_table(&self) -> CurrentTable {
        CurrentTable::new(
            self.metrics.clone(),
            self.bookmarks.clone(),
            self.visibility.clone(),
            self.context.filter(),
            self.context.rig_profile(),
            self.table_options(),
        )
    }

    pub fn history_panel(&self) -> HistoryPanel {
        HistoryPanel::new(self.metrics.clone(), self.visibility.clone())
    }

    pub fn context_panel(&self) -> ContextPanel {
        ContextPanel::new(self.rig_profiles.clone(), self.context.clone())
    }

    pub fn wallet_panel(&self) -> WalletPanel {
        WalletPanel::new(self.wallets.clone(), self.visibility.clone())
    }

    pub fn wallet_balances(&self) -> Feed<Balances> {
        self.wallet_panel().balances()
    }
}
