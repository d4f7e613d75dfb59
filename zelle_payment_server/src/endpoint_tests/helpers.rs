use std::time::Duration;

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use chrono::Utc;
use log::debug;
use serde_json::Value;
use tempfile::TempDir;
use zelle_payment_engine::{
    db_types::NewPayee,
    source::{MemorySource, RawNotification},
    PayeeManagement,
    PaymentsApi,
    Poller,
    PollerConfig,
    ScanEngine,
    SqliteDatabase,
};
use zpg_common::Cents;

use crate::{data_objects::ScanDefaults, routes::configure_routes};

type TestPoller = Poller<MemorySource, SqliteDatabase>;

/// A throwaway database and in-memory inbox wired up the same way the real server wires up its handlers.
pub struct TestServer {
    _dir: TempDir,
    pub db: SqliteDatabase,
    pub inbox: MemorySource,
    api: web::Data<PaymentsApi<SqliteDatabase>>,
    engine: web::Data<ScanEngine<MemorySource, SqliteDatabase>>,
    poller: web::Data<TestPoller>,
    defaults: web::Data<ScanDefaults>,
}

impl TestServer {
    pub async fn new() -> Self {
        let _ = env_logger::try_init();
        let dir = tempfile::tempdir().expect("Could not create temp dir");
        let url = format!("sqlite://{}", dir.path().join("endpoint_tests.db").display());
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Could not open test database");
        db.run_migrations().await.expect("Could not run migrations");
        let inbox = MemorySource::new();
        let engine = ScanEngine::new(inbox.clone(), db.clone());
        let config =
            PollerConfig { interval: Duration::from_secs(3600), lookback_days: 7, initial_delay: Duration::ZERO };
        let poller = web::Data::new(Poller::new(engine.clone(), config));
        Self {
            _dir: dir,
            api: web::Data::new(PaymentsApi::new(db.clone())),
            engine: web::Data::new(engine),
            poller,
            defaults: web::Data::new(ScanDefaults { days_back: 30 }),
            db,
            inbox,
        }
    }

    pub fn poller(&self) -> &TestPoller {
        &self.poller
    }

    pub async fn with_payees() -> Self {
        let server = Self::new().await;
        for payee in [
            NewPayee::new("m_banerjee", "Sunil Banerjee")
                .with_contact_address("sunil.banerjee@gmail.com")
                .with_balance_due(Cents::from_dollars(150)),
            NewPayee::new("m_sengupta", "Priya Sengupta").with_balance_due(Cents::from_dollars(100)),
            NewPayee::new("m_roy", "Amit Roy").with_balance_due(Cents::from_dollars(50)),
        ] {
            server.db.upsert_payee(payee).await.expect("Could not seed payee");
        }
        server
    }

    pub fn deliver(&self, id: &str, from: &str, subject: &str, body: &str) {
        let received_at = Utc::now() - chrono::Duration::hours(1);
        self.inbox.add_notification(&RawNotification::new(id, received_at, from, subject, body));
    }

    /// A Chase notification that the memo matches to Sunil Banerjee.
    pub fn deliver_banerjee_payment(&self, id: &str) {
        self.deliver(
            id,
            "no.reply.alerts@chase.com",
            "You received $150.00 from Sunil Banerjee via Zelle",
            "Sunil Banerjee sent you $150.00.\nMemo: Membership - Sunil Banerjee Family\nConfirmation: ABC123XYZ",
        );
    }

    /// A payment that matches nobody.
    pub fn deliver_donation(&self, id: &str) {
        self.deliver(
            id,
            "alerts@unknownbank.example",
            "Zelle: You received $75.00",
            "A payment has arrived.\nMemo: Saraswati Puja donation",
        );
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.call(TestRequest::get().uri(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.call(TestRequest::post().uri(path).set_json(body)).await
    }

    pub async fn post_empty(&self, path: &str) -> (StatusCode, Value) {
        self.call(TestRequest::post().uri(path)).await
    }

    async fn call(&self, req: TestRequest) -> (StatusCode, Value) {
        let (status, body) = self.call_raw(req).await;
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    async fn call_raw(&self, req: TestRequest) -> (StatusCode, web::Bytes) {
        let app = App::new()
            .app_data(self.api.clone())
            .app_data(self.engine.clone())
            .app_data(self.poller.clone())
            .app_data(self.defaults.clone())
            .configure(configure_routes::<MemorySource, SqliteDatabase>);
        let service = test::init_service(app).await;
        debug!("Making request");
        let res = test::call_service(&service, req.to_request()).await;
        let status = res.status();
        let body = test::read_body(res).await;
        (status, body)
    }
}

pub fn error_message(body: &Value) -> &str {
    body["error"].as_str().unwrap_or_default()
}
