use std::time::Duration;

use actix_web::http::StatusCode;
use zelle_payment_engine::IngestionStore;

use super::helpers::TestServer;

#[actix_web::test]
async fn start_and_stop_the_poller() {
    let server = TestServer::with_payees().await;
    server.deliver_banerjee_payment("n-1");

    let (status, res) = server.get("/api/poller/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["active"], false);
    assert!(res["recent_scans"].as_array().unwrap().is_empty());

    let (status, res) = server.post_empty("/api/poller/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["changed"], true);
    assert_eq!(res["active"], true);
    let (_, res) = server.post_empty("/api/poller/start").await;
    assert_eq!(res["changed"], false);
    assert!(server.poller().is_active());

    // The first scan happens straight away
    let mut scanned = false;
    for _ in 0..100 {
        if !server.db.recent_scans(1).await.unwrap().is_empty() {
            scanned = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(scanned, "The poller should have run a scan");
    assert!(server.db.fetch_payment_by_notification_id("n-1").await.unwrap().is_some());

    let (_, res) = server.get("/api/poller/status").await;
    assert_eq!(res["active"], true);
    assert_eq!(res["interval_seconds"], 3600);
    let scans = res["recent_scans"].as_array().unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0]["created"], 1);
    assert_eq!(scans[0]["auto_matched"], 1);

    let (status, res) = server.post_empty("/api/poller/stop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["changed"], true);
    assert_eq!(res["active"], false);
    let (_, res) = server.post_empty("/api/poller/stop").await;
    assert_eq!(res["changed"], false);
    assert!(!server.poller().is_active());
}

#[actix_web::test]
async fn poller_status_shows_at_most_ten_scans() {
    let server = TestServer::new().await;
    for _ in 0..12 {
        server.post_empty("/api/scan").await;
    }
    let (status, res) = server.get("/api/poller/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["recent_scans"].as_array().unwrap().len(), 10);
}
