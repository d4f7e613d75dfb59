use actix_web::http::StatusCode;
use serde_json::json;

use super::helpers::{error_message, TestServer};

#[actix_web::test]
async fn upsert_and_list_payees() {
    let server = TestServer::new().await;
    let (status, payees) = server.get("/api/payees").await;
    assert_eq!(status, StatusCode::OK);
    assert!(payees.as_array().unwrap().is_empty());

    let (status, payee) = server
        .post("/api/payees", json!({ "id": "m_das", "display_name": "Rina Das", "balance_due": 2_500 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payee["id"], "m_das");
    assert_eq!(payee["balance_due"], 2_500);
    assert_eq!(payee["total_paid"], 0);

    let (status, payee) = server
        .post(
            "/api/payees",
            json!({ "id": "m_das", "display_name": "Rina Das", "contact_address": "rina@example.com", "balance_due": 4_000 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payee["contact_address"], "rina@example.com");
    assert_eq!(payee["balance_due"], 4_000);

    let (_, payees) = server.get("/api/payees").await;
    assert_eq!(payees.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn payee_needs_an_id() {
    let server = TestServer::new().await;
    let (status, body) = server.post("/api/payees", json!({ "id": "  ", "display_name": "Nobody" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("non-empty id"));

    let (status, _) = server.post("/api/payees", json!({ "display_name": "Nobody" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn payee_balance_due_cannot_be_negative() {
    let server = TestServer::with_payees().await;
    let (status, body) =
        server.post("/api/payees", json!({ "id": "m_roy", "display_name": "Amit Roy", "balance_due": -500 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("cannot be negative"));

    let (_, payees) = server.get("/api/payees").await;
    let roy = payees.as_array().unwrap().iter().find(|p| p["id"] == "m_roy").unwrap();
    assert_eq!(roy["balance_due"], 5_000);
}

#[actix_web::test]
async fn payee_history() {
    let server = TestServer::with_payees().await;
    server.deliver_banerjee_payment("n-1");
    server.post_empty("/api/scan").await;

    let (status, history) = server.get("/api/payees/m_banerjee/history").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["payee"]["display_name"], "Sunil Banerjee");
    let entries = history["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["entry_type"], "applied");
    assert_eq!(entries[0]["amount"], 15_000);
    assert_eq!(entries[0]["balance_due_before"], 15_000);
    assert_eq!(entries[0]["balance_due_after"], 0);
    assert!(entries[0]["receipt_number"].as_str().unwrap().starts_with("ZP-"));

    let (status, history) = server.get("/api/payees/m_roy/history").await;
    assert_eq!(status, StatusCode::OK);
    assert!(history["entries"].as_array().unwrap().is_empty());

    let (status, body) = server.get("/api/payees/m_nobody/history").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(error_message(&body).contains("m_nobody"));
}
