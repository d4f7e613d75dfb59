use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use zelle_payment_engine::{db_types::NewPayee, PayeeManagement, SqliteDatabase};
use zpg_common::Cents;

pub fn random_db_path() -> String {
    let path = std::env::temp_dir().join(format!("zpg_test_store_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

pub async fn create_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("Nothing to drop at {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("Created Sqlite database {url}");
}

/// Creates a fresh database at a random location, runs the migrations, and returns a connection to it.
pub async fn prepare_test_env() -> (String, SqliteDatabase) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_path();
    create_database(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    (url, db)
}

pub async fn destroy_test_env(url: &str, mut db: SqliteDatabase) {
    use zelle_payment_engine::IngestionStore;
    db.close().await.expect("Error closing database");
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Could not remove test database {url}: {e}");
    }
}

/// The payees used throughout the tests.
pub async fn seed_payees(db: &SqliteDatabase) {
    let payees = [
        NewPayee::new("m_banerjee", "Sunil Banerjee")
            .with_contact_address("sunil.banerjee@gmail.com")
            .with_balance_due(Cents::from_dollars(150)),
        NewPayee::new("m_sengupta", "Priya Sengupta").with_balance_due(Cents::from_dollars(100)),
        NewPayee::new("m_roy", "Amit Roy").with_balance_due(Cents::from_dollars(50)),
    ];
    for payee in payees {
        db.upsert_payee(payee).await.expect("Error creating payee");
    }
}
