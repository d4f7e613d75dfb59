use std::{path::Path, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use zelle_payment_engine::{
    source::{MaildirSource, NotificationSource},
    IngestionStore,
    PaymentsApi,
    Poller,
    ScanEngine,
    SqliteDatabase,
};

use crate::{config::ServerConfig, data_objects::ScanDefaults, errors::ServerError, routes::configure_routes};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    prepare_directories(&config).await?;
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(format!("Migrations failed. {e}")))?;
    let source = MaildirSource::new(&config.mailbox_path);
    info!("💻️ Reading payment notifications from {}", source.path().display());
    let srv = create_server_instance(config, source, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Builds the HTTP server. The scan engine and poller are created once here and shared by every worker, so that the
/// poller endpoints all control the same polling loop.
///
/// If `poller_autostart` is set, the poller is started before the server is returned, so this must be called from
/// within a tokio runtime.
pub fn create_server_instance<S, B>(config: ServerConfig, source: S, db: B) -> Result<Server, ServerError>
where
    S: NotificationSource,
    B: IngestionStore,
{
    let engine = ScanEngine::new(source, db.clone());
    let poller = web::Data::new(Poller::new(engine.clone(), config.poller_config()));
    let engine = web::Data::new(engine);
    let api = web::Data::new(PaymentsApi::new(db));
    let defaults = web::Data::new(ScanDefaults { days_back: config.manual_scan_days });
    if config.poller_autostart {
        poller.start();
    } else {
        info!("💻️ Poller autostart is disabled. Use POST /api/poller/start to start it.");
    }
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("zpg::access_log"))
            .app_data(api.clone())
            .app_data(engine.clone())
            .app_data(poller.clone())
            .app_data(defaults.clone())
            .configure(configure_routes::<S, B>)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Creates the mailbox directory and the database's parent directory if they do not exist yet.
async fn prepare_directories(config: &ServerConfig) -> Result<(), ServerError> {
    tokio::fs::create_dir_all(&config.mailbox_path).await?;
    let db_file = config.database_url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
    let db_file = db_file.split('?').next().unwrap_or_default();
    if db_file.is_empty() || db_file.starts_with(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(db_file).parent().filter(|p| !p.as_os_str().is_empty()) {
        debug!("💻️ Making sure that {} exists", parent.display());
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}
