use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;

use crate::marketplace::domain::PaymentPhase;
use crate::marketplace::marketplace_router;
use crate::marketplace::router::{AUTH_SUBJECT_HEADER, GATEWAY_SIGNATURE_HEADER};

fn router(harness: &Harness) -> axum::Router {
    marketplace_router(Arc::clone(&harness.market))
}

async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn draft_body() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "commodity_category": "Rice",
        "sub_commodity": "Basmati",
        "volume": "200 MT",
        "inspection_location": "Kandla Port",
        "country": "India",
        "inspection_types": { "physical": true },
        "physical_parameters": { "purity": 95.0 },
        "inspection_budget_minor": 100_000
    }))
    .expect("draft body")
}

#[tokio::test]
async fn requests_without_a_session_header_are_unauthorized() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(
            Request::get("/api/v1/enquiries")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_subjects_are_unauthorized() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(
            Request::get("/api/v1/enquiries")
                .header(AUTH_SUBJECT_HEADER, "nobody")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_enquiry_returns_created_without_the_platform_fee() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(
            Request::post("/api/v1/enquiries")
                .header(AUTH_SUBJECT_HEADER, "cust-01")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(draft_body()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["status"], "draft");
    assert_eq!(body["inspection_budget_minor"], 100_000);
    assert!(body.get("platform_fee_minor").is_none());
}

#[tokio::test]
async fn create_enquiry_rejects_drafts_without_inspection_types() {
    let harness = harness();
    let body = serde_json::to_vec(&json!({
        "commodity_category": "Rice",
        "sub_commodity": "Basmati",
        "volume": "200 MT",
        "inspection_location": "Kandla Port",
        "country": "India",
        "inspection_types": {},
        "inspection_budget_minor": 100_000
    }))
    .unwrap();

    let response = router(&harness)
        .oneshot(
            Request::post("/api/v1/enquiries")
                .header(AUTH_SUBJECT_HEADER, "cust-01")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("inspection type"));
}

#[tokio::test]
async fn open_enquiries_show_inspectors_the_net_budget() {
    let harness = harness();
    submitted_enquiry(&harness, &customer());

    let response = router(&harness)
        .oneshot(
            Request::get("/api/v1/enquiries/open")
                .header(AUTH_SUBJECT_HEADER, "insp-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let rows = body.as_array().expect("array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["inspection_budget_minor"], 70_000);
    assert!(rows[0].get("customer").is_none());
}

#[tokio::test]
async fn submit_without_payment_maps_to_conflict() {
    let harness = harness();
    let enquiry = harness
        .market
        .enquiries
        .create(&customer(), draft())
        .expect("create");

    let response = router(&harness)
        .oneshot(
            Request::post(format!("/api/v1/enquiries/{}/submit", enquiry.id.0))
                .header(AUTH_SUBJECT_HEADER, "cust-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn place_and_list_bids_over_http() {
    let harness = harness();
    let enquiry = submitted_enquiry(&harness, &customer());
    let app = router(&harness);

    let response = app
        .clone()
        .oneshot(
            Request::put(format!("/api/v1/enquiries/{}/bid", enquiry.id.0))
                .header(AUTH_SUBJECT_HEADER, "insp-01")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({ "amount_minor": 60_000 })).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let placed = read_json(response).await;
    assert_eq!(placed["amount_minor"], 60_000);
    assert_eq!(placed["status"], "active");

    // The owning customer sees the gross price for the same bid.
    let response = app
        .oneshot(
            Request::get(format!("/api/v1/enquiries/{}/bids", enquiry.id.0))
                .header(AUTH_SUBJECT_HEADER, "cust-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["bids"][0]["amount_minor"], 90_000);
    assert_eq!(body["stats"]["lowest_minor"], 90_000);
}

#[tokio::test]
async fn confirm_route_reports_the_outcome() {
    let harness = harness();
    let enquiry = submitted_enquiry(&harness, &customer());
    let bid = harness
        .market
        .bids
        .place(
            &inspector(),
            &enquiry.id,
            crate::marketplace::bids::BidRequest {
                amount_minor: 60_000,
                note: None,
            },
        )
        .expect("bid");

    let response = router(&harness)
        .oneshot(
            Request::post(format!("/api/v1/bids/{}/confirm", bid.id.0))
                .header(AUTH_SUBJECT_HEADER, "cust-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["enquiry"]["status"], "completed");
    assert_eq!(body["winning_bid"]["status"], "won");
    assert_eq!(body["lost_bids"], 0);
}

#[tokio::test]
async fn webhook_rejects_forged_signatures() {
    let harness = harness();
    let payload = serde_json::to_vec(&json!({
        "order_id": "order_000001",
        "state": "captured"
    }))
    .unwrap();

    let response = router(&harness)
        .oneshot(
            Request::post("/api/v1/payments/webhook")
                .header(GATEWAY_SIGNATURE_HEADER, "deadbeef")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_settles_a_pending_order() {
    let harness = harness();
    let caller = customer();
    let enquiry = harness
        .market
        .enquiries
        .create(&caller, draft())
        .expect("create");
    let order = harness
        .market
        .payments
        .create_order(&caller, &enquiry.id, PaymentPhase::Initial)
        .expect("order");

    let payload = serde_json::to_vec(&json!({
        "order_id": order.gateway_order_id,
        "payment_id": "gw_pay_7",
        "state": "captured"
    }))
    .unwrap();
    let signature = sign_payload(&payload);

    let response = router(&harness)
        .oneshot(
            Request::post("/api/v1/payments/webhook")
                .header(GATEWAY_SIGNATURE_HEADER, signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "paid");
}

#[tokio::test]
async fn payment_route_opens_an_order_with_a_default_phase() {
    let harness = harness();
    let enquiry = harness
        .market
        .enquiries
        .create(&customer(), draft())
        .expect("create");

    let response = router(&harness)
        .oneshot(
            Request::post(format!("/api/v1/enquiries/{}/payments", enquiry.id.0))
                .header(AUTH_SUBJECT_HEADER, "cust-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["phase"], "initial");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["amount_minor"], 100_000);
}

#[tokio::test]
async fn document_upload_flips_the_publish_flag_once_complete() {
    let harness = harness();

    let response = router(&harness)
        .oneshot(
            Request::put("/api/v1/profile/documents")
                .header(AUTH_SUBJECT_HEADER, "cust-02")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "trade_license": "docs/tl.pdf",
                        "import_export_certificate": "docs/iec.pdf"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["publish_requirements"], true);
    assert!(body["missing_documents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn compliance_upload_flips_the_accepts_requests_flag() {
    let harness = harness();

    let response = router(&harness)
        .oneshot(
            Request::put("/api/v1/profile/compliance")
                .header(AUTH_SUBJECT_HEADER, "insp-03")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "aadhaar_card": "docs/aadhaar.pdf",
                        "account_number": "111222333",
                        "bank_name": "Axis Bank",
                        "ifsc_code": "UTIB0000001"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["accepts_requests"], true);
}

#[tokio::test]
async fn entitlement_route_reflects_paid_orders() {
    let harness = harness();
    let caller = customer();
    let enquiry = harness
        .market
        .enquiries
        .create(&caller, draft())
        .expect("create");
    pay_initial(&harness, &caller, &enquiry);

    let response = router(&harness)
        .oneshot(
            Request::get("/api/v1/payments/entitlement")
                .header(AUTH_SUBJECT_HEADER, "cust-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["entitled"], true);
}
