use std::sync::Arc;

use mongodb::Database;

use crate::config::AppConfig;
use crate::services::mpesa_service::MpesaService;
use crate::store::TransactionStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub store: Arc<dyn TransactionStore>,
    pub mpesa: Arc<MpesaService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        db: Database,
        store: Arc<dyn TransactionStore>,
        mpesa: Arc<MpesaService>,
        config: Arc<AppConfig>,
    ) -> Self {
        AppState {
            db,
            store,
            mpesa,
            config,
        }
    }
}
