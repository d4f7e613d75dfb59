use actix_web::http::StatusCode;
use serde_json::{json, Value};

use super::helpers::{error_message, TestServer};

async fn payment_id_for(server: &TestServer, notification_id: &str) -> i64 {
    let (status, page) = server.get("/api/payments?limit=1000").await;
    assert_eq!(status, StatusCode::OK);
    page["payments"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["notification_id"] == notification_id)
        .and_then(|p| p["id"].as_i64())
        .unwrap_or_else(|| panic!("No payment for {notification_id}"))
}

fn find_payee<'a>(payees: &'a Value, id: &str) -> &'a Value {
    payees.as_array().unwrap().iter().find(|p| p["id"] == id).unwrap()
}

#[actix_web::test]
async fn health_reports_the_poller() {
    let server = TestServer::new().await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert_eq!(body["active"], false);
    assert_eq!(body["interval_seconds"], 3600);

    server.post_empty("/api/poller/start").await;
    let (_, body) = server.get("/health").await;
    assert_eq!(body["active"], true);
    server.post_empty("/api/poller/stop").await;
}

#[actix_web::test]
async fn manual_scan_records_and_matches() {
    let server = TestServer::with_payees().await;
    server.deliver_banerjee_payment("n-1");
    server.deliver_donation("n-2");
    server.deliver("n-3", "news@example.com", "Our spring newsletter", "Nothing about money in here.");

    let (status, summary) = server.post_empty("/api/scan").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["examined"], 3);
    assert_eq!(summary["created"], 2);
    assert_eq!(summary["auto_matched"], 1);
    assert_eq!(summary["not_payments"], 1);
    assert_eq!(summary["errors"].as_array().unwrap().len(), 0);

    let (status, summary) = server.post("/api/scan", json!({ "days_back": 7 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["created"], 0);
    assert_eq!(summary["skipped"], 2);

    let (status, page) = server.get("/api/payments").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    let (_, page) = server.get("/api/payments?status=pending").await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["payments"][0]["notification_id"], "n-2");
    let (_, page) = server.get("/api/payments?status=auto_verified").await;
    assert_eq!(page["payments"][0]["payee_id"], "m_banerjee");
    assert_eq!(page["payments"][0]["amount"], 15_000);
}

#[actix_web::test]
async fn oversized_scan_lookback_is_capped() {
    let server = TestServer::new().await;
    server.deliver_donation("n-1");
    let (status, summary) = server.post("/api/scan", json!({ "days_back": u32::MAX })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["examined"], 1);
    assert_eq!(summary["created"], 1);
    assert_eq!(summary["errors"].as_array().unwrap().len(), 0);
    let (_, res) = server.get("/api/poller/status").await;
    assert_eq!(res["recent_scans"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn bad_requests_are_rejected() {
    let server = TestServer::new().await;
    let (status, body) = server.get("/api/payments?status=lost").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).starts_with("Could not read request query"));

    let (status, body) = server.get("/api/payments/not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).starts_with("Could not read request path"));

    let (status, body) = server.get("/api/payments/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(error_message(&body).contains("Payment 999 does not exist"));

    let (status, _) = server.post("/api/payments/999/match", json!({ "wrong": "shape" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn verify_pending_payment_credits_the_named_payee() {
    let server = TestServer::with_payees().await;
    server.deliver_donation("n-1");
    server.post_empty("/api/scan").await;
    let id = payment_id_for(&server, "n-1").await;

    let (status, res) =
        server.post(&format!("/api/payments/{id}/verify"), json!({ "payee_id": "m_roy", "verified_by": "treasurer" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["changed"], true);
    assert_eq!(res["payment"]["status"], "verified");
    assert_eq!(res["payment"]["verified_by"], "treasurer");
    assert_eq!(res["payment"]["applied_payee_id"], "m_roy");

    // $75 against a $50 balance leaves nothing due
    let (_, payees) = server.get("/api/payees").await;
    let roy = find_payee(&payees, "m_roy");
    assert_eq!(roy["balance_due"], 0);
    assert_eq!(roy["total_paid"], 7_500);

    // Verifying again changes nothing
    let (status, res) = server.post_empty(&format!("/api/payments/{id}/verify")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["changed"], false);

    // A verified payment can no longer be rejected
    let (status, body) = server.post(&format!("/api/payments/{id}/reject"), json!({ "reason": "duplicate" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(error_message(&body).contains("Cannot reject"));
}

#[actix_web::test]
async fn verify_without_payee_keeps_balances() {
    let server = TestServer::with_payees().await;
    server.deliver_donation("n-1");
    server.post_empty("/api/scan").await;
    let id = payment_id_for(&server, "n-1").await;

    let (status, res) = server.post_empty(&format!("/api/payments/{id}/verify")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["payment"]["status"], "verified");
    assert_eq!(res["payment"]["verified_by"], "admin");
    assert_eq!(res["payment"]["payee_id"], Value::Null);
    let (_, history) = server.get("/api/history").await;
    assert_eq!(history.as_array().unwrap().len(), 0);
}

#[actix_web::test]
async fn verify_to_unknown_payee_is_not_found() {
    let server = TestServer::with_payees().await;
    server.deliver_donation("n-1");
    server.post_empty("/api/scan").await;
    let id = payment_id_for(&server, "n-1").await;

    let (status, _) = server.post(&format!("/api/payments/{id}/verify"), json!({ "payee_id": "m_nobody" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, payment) = server.get(&format!("/api/payments/{id}")).await;
    assert_eq!(payment["status"], "pending");
}

#[actix_web::test]
async fn reject_is_final() {
    let server = TestServer::with_payees().await;
    server.deliver_donation("n-1");
    server.post_empty("/api/scan").await;
    let id = payment_id_for(&server, "n-1").await;

    let (status, res) = server.post(&format!("/api/payments/{id}/reject"), json!({ "reason": "Not ours" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["payment"]["status"], "rejected");
    assert_eq!(res["payment"]["rejection_reason"], "Not ours");

    let (status, _) = server.post_empty(&format!("/api/payments/{id}/verify")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = server.post(&format!("/api/payments/{id}/match"), json!({ "payee_id": "m_roy" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = server.post_empty(&format!("/api/payments/{id}/reject")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn match_moves_the_credit_to_another_payee() {
    let server = TestServer::with_payees().await;
    server.deliver_banerjee_payment("n-1");
    server.post_empty("/api/scan").await;
    let id = payment_id_for(&server, "n-1").await;

    let (status, res) = server.post(&format!("/api/payments/{id}/match"), json!({ "payee_id": "m_sengupta" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["payment"]["status"], "verified");
    assert_eq!(res["payment"]["payee_id"], "m_sengupta");
    assert_eq!(res["payment"]["auto_matched"], false);

    let (_, payees) = server.get("/api/payees").await;
    let banerjee = find_payee(&payees, "m_banerjee");
    assert_eq!(banerjee["balance_due"], 15_000);
    assert_eq!(banerjee["total_paid"], 0);
    let sengupta = find_payee(&payees, "m_sengupta");
    assert_eq!(sengupta["balance_due"], 0);
    assert_eq!(sengupta["total_paid"], 15_000);

    // applied, reversed, applied
    let (status, history) = server.get("/api/history?limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 3);
    let (_, history) = server.get("/api/history?limit=1").await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn stats_include_poller_status() {
    let server = TestServer::with_payees().await;
    server.deliver_banerjee_payment("n-1");
    server.deliver_donation("n-2");
    server.post_empty("/api/scan").await;

    let (status, stats) = server.get("/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_payments"], 2);
    assert_eq!(stats["total_amount"], 22_500);
    assert_eq!(stats["auto_matched"], 1);
    assert_eq!(stats["pending_count"], 1);
    assert_eq!(stats["poller"]["active"], false);
    assert_eq!(stats["poller"]["interval_seconds"], 3600);
    assert_eq!(stats["last_scan"]["created"], 2);
}
