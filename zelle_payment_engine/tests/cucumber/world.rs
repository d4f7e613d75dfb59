use cucumber::World;
use log::*;
use zelle_payment_engine::{
    source::MemorySource,
    traits::{IngestionError, ReviewOutcome},
    PaymentsApi,
    ScanEngine,
    ScanSummary,
    SqliteDatabase,
};

use crate::support::prepare_env::prepare_test_env;

#[derive(Default, Debug, World)]
pub struct ZelleWorld {
    pub system: Option<ReconciliationSystem>,
    pub last_scan: Option<ScanSummary>,
    pub last_review: Option<Result<ReviewOutcome, IngestionError>>,
}

#[derive(Debug)]
pub struct ReconciliationSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub inbox: MemorySource,
    pub engine: ScanEngine<MemorySource, SqliteDatabase>,
    pub api: PaymentsApi<SqliteDatabase>,
}

impl ZelleWorld {
    pub fn system(&self) -> &ReconciliationSystem {
        self.system.as_ref().expect("System not initialised")
    }

    pub fn api(&self) -> &PaymentsApi<SqliteDatabase> {
        &self.system().api
    }

    pub fn db(&self) -> &SqliteDatabase {
        &self.system().db
    }

    pub fn last_scan(&self) -> &ScanSummary {
        self.last_scan.as_ref().expect("No scan has run yet")
    }
}

impl ReconciliationSystem {
    pub async fn new() -> Self {
        let (db_path, db) = prepare_test_env().await;
        debug!("Created database: {db_path}");
        let inbox = MemorySource::new();
        let engine = ScanEngine::new(inbox.clone(), db.clone());
        let api = PaymentsApi::new(db.clone());
        Self { db_path, db, inbox, engine, api }
    }
}
