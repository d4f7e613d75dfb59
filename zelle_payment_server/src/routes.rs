//! Request handler definitions
//!
//! Each route is declared with the `route!` macro next to its handler. Handlers are generic over the notification
//! source and the storage backend so that the endpoint tests can run them against an in-memory inbox.
//!
//! Handlers must never block the worker thread. Everything that touches the database or the mailbox is awaited.
use actix_web::{web, HttpResponse};
use log::*;
use zelle_payment_engine::{
    db_types::{NewPayee, PayeeId},
    source::NotificationSource,
    IngestionStore,
    PaymentsApi,
    Poller,
    ScanEngine,
    MAX_LOOKBACK_DAYS,
};

use crate::{
    data_objects::{
        HealthResponse,
        HistoryQuery,
        MatchRequest,
        PaymentListQuery,
        PollerActionResponse,
        PollerStatusResponse,
        RejectRequest,
        ReviewResponse,
        ScanDefaults,
        ScanRequest,
        StatsResponse,
        VerifyRequest,
        POLLER_STATUS_SCANS,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

/// Registers every route under `/api`, plus the health check at `/health`, for the given source and backend types.
///
/// The caller must supply `web::Data` for `PaymentsApi<B>`, `ScanEngine<S, B>`, `Poller<S, B>` and [`ScanDefaults`].
pub fn configure_routes<S, B>(cfg: &mut web::ServiceConfig)
where
    S: NotificationSource,
    B: IngestionStore,
{
    let api_scope = web::scope("/api")
        .app_data(
            web::JsonConfig::default().error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into()),
        )
        .app_data(
            web::QueryConfig::default().error_handler(|err, _req| ServerError::InvalidRequestQuery(err.to_string()).into()),
        )
        .app_data(
            web::PathConfig::default().error_handler(|err, _req| ServerError::InvalidRequestPath(err.to_string()).into()),
        )
        .service(ScanRoute::<S, B>::new())
        .service(PaymentsRoute::<B>::new())
        .service(PaymentByIdRoute::<B>::new())
        .service(VerifyPaymentRoute::<B>::new())
        .service(RejectPaymentRoute::<B>::new())
        .service(MatchPaymentRoute::<B>::new())
        .service(StatsRoute::<S, B>::new())
        .service(PayeesRoute::<B>::new())
        .service(UpsertPayeeRoute::<B>::new())
        .service(PayeeHistoryRoute::<B>::new())
        .service(AuditHistoryRoute::<B>::new())
        .service(PollerStartRoute::<S, B>::new())
        .service(PollerStopRoute::<S, B>::new())
        .service(PollerStatusRoute::<S, B>::new());
    cfg.service(HealthRoute::<S, B>::new()).service(api_scope);
}

// ----------------------------------------------   Health  ----------------------------------------------------
route!(health => Get "/health" impl NotificationSource, IngestionStore);
/// Reports that the server is up, along with the state of the background poller.
pub async fn health<S, B>(poller: web::Data<Poller<S, B>>) -> Result<HttpResponse, ServerError>
where
    S: NotificationSource,
    B: IngestionStore,
{
    trace!("💻️ Received health check request");
    Ok(HttpResponse::Ok().json(HealthResponse { status: "running", poller: poller.status() }))
}

//----------------------------------------------   Scan  ----------------------------------------------------
route!(scan => Post "/scan" impl NotificationSource, IngestionStore);
/// Runs a scan right now, in the request. The response is the scan summary.
///
/// The body is optional. `days_back` defaults to the configured manual scan lookback, and is capped at
/// [`MAX_LOOKBACK_DAYS`]. A scan never fails as a whole:
/// problems are reported in the summary's `errors` list.
pub async fn scan<S, B>(
    body: Option<web::Json<ScanRequest>>,
    engine: web::Data<ScanEngine<S, B>>,
    defaults: web::Data<ScanDefaults>,
) -> Result<HttpResponse, ServerError>
where
    S: NotificationSource,
    B: IngestionStore,
{
    let requested = body.and_then(|b| b.days_back).unwrap_or(defaults.days_back);
    let days_back = requested.min(MAX_LOOKBACK_DAYS);
    if days_back < requested {
        warn!("💻️ A scan of the last {requested} days was requested. Scanning the last {days_back} days instead");
    }
    info!("💻️ Manual scan requested for the last {days_back} days");
    let summary = engine.scan(days_back).await;
    Ok(HttpResponse::Ok().json(summary))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payments => Get "/payments" impl IngestionStore);
pub async fn payments<B: IngestionStore>(
    query: web::Query<PaymentListQuery>,
    api: web::Data<PaymentsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    debug!("💻️ GET payments {query:?}");
    let page = api.list_payments(query.status, query.limit, query.offset).await?;
    Ok(HttpResponse::Ok().json(page))
}

route!(payment_by_id => Get "/payments/{id}" impl IngestionStore);
pub async fn payment_by_id<B: IngestionStore>(
    path: web::Path<i64>,
    api: web::Data<PaymentsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ GET payment #{id}");
    let payment = api.payment(id).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(verify_payment => Post "/payments/{id}/verify" impl IngestionStore);
/// Confirms a payment, optionally naming the payee to credit. An empty body keeps the current match.
pub async fn verify_payment<B: IngestionStore>(
    path: web::Path<i64>,
    body: Option<web::Json<VerifyRequest>>,
    api: web::Data<PaymentsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let req = body.map(|b| b.into_inner()).unwrap_or_default();
    info!("💻️ Verify payment #{id} (payee: {:?}) by {}", req.payee_id, req.reviewer());
    let outcome = api.verify(id, req.payee_id.clone(), req.reviewer()).await?;
    Ok(HttpResponse::Ok().json(ReviewResponse { payment: outcome.payment, changed: outcome.changed }))
}

route!(reject_payment => Post "/payments/{id}/reject" impl IngestionStore);
pub async fn reject_payment<B: IngestionStore>(
    path: web::Path<i64>,
    body: Option<web::Json<RejectRequest>>,
    api: web::Data<PaymentsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let reason = body.and_then(|b| b.into_inner().reason);
    info!("💻️ Reject payment #{id}. Reason: {}", reason.as_deref().unwrap_or("none given"));
    let outcome = api.reject(id, reason).await?;
    Ok(HttpResponse::Ok().json(ReviewResponse { payment: outcome.payment, changed: outcome.changed }))
}

route!(match_payment => Post "/payments/{id}/match" impl IngestionStore);
/// Assigns a payment to a payee and marks it verified. Any earlier credit to a different payee is reversed.
pub async fn match_payment<B: IngestionStore>(
    path: web::Path<i64>,
    body: web::Json<MatchRequest>,
    api: web::Data<PaymentsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let req = body.into_inner();
    info!("💻️ Match payment #{id} to {} by {}", req.payee_id, req.reviewer());
    let outcome = api.rematch(id, req.payee_id.clone(), req.reviewer()).await?;
    Ok(HttpResponse::Ok().json(ReviewResponse { payment: outcome.payment, changed: outcome.changed }))
}

//----------------------------------------------   Stats  ----------------------------------------------------
route!(stats => Get "/stats" impl NotificationSource, IngestionStore);
pub async fn stats<S, B>(
    api: web::Data<PaymentsApi<B>>,
    poller: web::Data<Poller<S, B>>,
) -> Result<HttpResponse, ServerError>
where
    S: NotificationSource,
    B: IngestionStore,
{
    trace!("💻️ GET stats");
    let stats = api.stats().await?;
    Ok(HttpResponse::Ok().json(StatsResponse { stats, poller: poller.status() }))
}

//----------------------------------------------   Payees  ----------------------------------------------------
route!(payees => Get "/payees" impl IngestionStore);
pub async fn payees<B: IngestionStore>(api: web::Data<PaymentsApi<B>>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET payees");
    let payees = api.payees().await?;
    Ok(HttpResponse::Ok().json(payees))
}

route!(upsert_payee => Post "/payees" impl IngestionStore);
/// Creates a payee, or updates the name, contact address and balance due of an existing one.
pub async fn upsert_payee<B: IngestionStore>(
    body: web::Json<NewPayee>,
    api: web::Data<PaymentsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payee = body.into_inner();
    info!("💻️ Upsert payee {} ({})", payee.id, payee.display_name);
    let payee = api.upsert_payee(payee).await?;
    Ok(HttpResponse::Ok().json(payee))
}

route!(payee_history => Get "/payees/{id}/history" impl IngestionStore);
pub async fn payee_history<B: IngestionStore>(
    path: web::Path<String>,
    api: web::Data<PaymentsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = PayeeId::from(path.into_inner());
    debug!("💻️ GET history for payee {id}");
    let history = api.payee_history(&id).await?;
    Ok(HttpResponse::Ok().json(history))
}

//----------------------------------------------   History  ----------------------------------------------------
route!(audit_history => Get "/history" impl IngestionStore);
pub async fn audit_history<B: IngestionStore>(
    query: web::Query<HistoryQuery>,
    api: web::Data<PaymentsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let limit = query.limit();
    debug!("💻️ GET audit history (limit {limit})");
    let entries = api.audit_history(limit).await?;
    Ok(HttpResponse::Ok().json(entries))
}

//----------------------------------------------   Poller  ----------------------------------------------------
route!(poller_start => Post "/poller/start" impl NotificationSource, IngestionStore);
pub async fn poller_start<S, B>(poller: web::Data<Poller<S, B>>) -> Result<HttpResponse, ServerError>
where
    S: NotificationSource,
    B: IngestionStore,
{
    let changed = poller.start();
    info!("💻️ Poller start requested. {}", if changed { "Started." } else { "It was already running." });
    Ok(HttpResponse::Ok().json(PollerActionResponse { changed, status: poller.status() }))
}

route!(poller_stop => Post "/poller/stop" impl NotificationSource, IngestionStore);
pub async fn poller_stop<S, B>(poller: web::Data<Poller<S, B>>) -> Result<HttpResponse, ServerError>
where
    S: NotificationSource,
    B: IngestionStore,
{
    let changed = poller.stop();
    info!("💻️ Poller stop requested. {}", if changed { "Stopping." } else { "It was not running." });
    Ok(HttpResponse::Ok().json(PollerActionResponse { changed, status: poller.status() }))
}

route!(poller_status => Get "/poller/status" impl NotificationSource, IngestionStore);
pub async fn poller_status<S, B>(
    poller: web::Data<Poller<S, B>>,
    api: web::Data<PaymentsApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    S: NotificationSource,
    B: IngestionStore,
{
    trace!("💻️ GET poller status");
    let recent_scans = api.recent_scans(POLLER_STATUS_SCANS).await?;
    Ok(HttpResponse::Ok().json(PollerStatusResponse { status: poller.status(), recent_scans }))
}
