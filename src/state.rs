use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::accounts::{AccountManager, AccountSettings, SqliteAccountRepository};
use crate::catalog::repository::DynStyleRepository;
use crate::catalog::{CatalogManager, SqliteStyleRepository};
use crate::config::Config;
use crate::notify::DynNotifier;
use crate::reviews::{ReviewAggregator, SqliteReviewRepository};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub accounts: AccountManager,
    pub catalog: CatalogManager,
    pub reviews: ReviewAggregator,
    pub notifier: DynNotifier,
}

impl AppState {
    /// Wires every manager onto one shared pool.
    pub fn new(db: DbPool, config: Config, notifier: DynNotifier) -> Self {
        let accounts = AccountManager::new(
            Arc::new(SqliteAccountRepository::new(db.clone())),
            AccountSettings::from_config(&config.auth),
        );
        let styles: DynStyleRepository = Arc::new(SqliteStyleRepository::new(db.clone()));
        let catalog = CatalogManager::new(styles.clone(), config.catalog.clone());
        let reviews = ReviewAggregator::new(
            Arc::new(SqliteReviewRepository::new(db.clone())),
            styles,
            accounts.clone(),
            config.reviews.clone(),
        );

        Self {
            db,
            config,
            accounts,
            catalog,
            reviews,
            notifier,
        }
    }
}
