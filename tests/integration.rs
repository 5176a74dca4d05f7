use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use courierx::api::rest::router;
use courierx::models::parcel::{Coordinate, Parcel, ParcelStatus};
use courierx::session::storage::MemoryStorage;
use courierx::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(
        1024,
        3600,
        "http://localhost:3000".to_string(),
        Arc::new(MemoryStorage::new()),
    ))
}

fn setup() -> axum::Router {
    router(test_state())
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn book_request(sender: &str) -> Request<Body> {
    json_request(
        "POST",
        "/parcels/book",
        json!({
            "recipientName": "Jane",
            "recipientEmail": "jane@example.com",
            "parcelType": "Small Box",
            "isCOD": false,
            "pickupAddress": "12 Elm St",
            "deliveryAddress": "5 Oak Ave",
            "pickupLat": 23.81,
            "pickupLng": 90.41,
            "deliveryLat": 23.77,
            "deliveryLng": 90.40,
            "sender": sender,
        }),
    )
}

async fn register_user(app: &axum::Router, name: &str, email: &str, role: &str) -> Value {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            json!({
                "name": name,
                "email": email,
                "password": "secret123",
                "role": role,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["users"], 0);
    assert_eq!(body["parcels"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("parcels_booked_total"));
    assert!(body.contains("live_subscribers"));
}

#[tokio::test]
async fn register_then_login_issues_token_and_session() {
    let state = test_state();
    let app = router(state.clone());

    let user = register_user(&app, "Jane", "jane@example.com", "customer").await;
    assert_eq!(user["role"], "customer");
    assert!(user["expiry"].is_null());

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "jane@example.com", "password": "secret123" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert_eq!(body["user"]["email"], "jane@example.com");
    assert!(!body["user"]["expiry"].is_null());

    let res = app.oneshot(get_request("/auth/session")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let session = body_json(res).await;
    assert_eq!(session["email"], "jane@example.com");
}

#[tokio::test]
async fn login_with_wrong_password_returns_401() {
    let app = setup();
    register_user(&app, "Jane", "jane@example.com", "customer").await;

    let res = app
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "jane@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_endpoint_without_login_returns_401() {
    let app = setup();
    let res = app.oneshot(get_request("/auth/session")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_session() {
    let app = setup();
    register_user(&app, "Jane", "jane@example.com", "customer").await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "jane@example.com", "password": "secret123" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(json_request("POST", "/auth/logout", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = app.oneshot(get_request("/auth/session")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_creates_parcel_with_exact_locations() {
    let app = setup();
    let sender = Uuid::new_v4().to_string();

    let res = app.oneshot(book_request(&sender)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["recipientName"], "Jane");
    assert_eq!(body["status"], "Booked");
    assert_eq!(body["isCOD"], false);
    assert_eq!(body["pickupLocation"]["lat"], 23.81);
    assert_eq!(body["pickupLocation"]["lng"], 90.41);
    assert_eq!(body["deliveryLocation"]["lat"], 23.77);
    assert_eq!(body["deliveryLocation"]["lng"], 90.40);
    assert!(body["currentLocation"].is_null());
    assert!(body["id"].as_str().unwrap().len() > 0);
}

#[tokio::test]
async fn booking_with_empty_recipient_returns_400() {
    let app = setup();
    let res = app
        .oneshot(json_request(
            "POST",
            "/parcels/book",
            json!({
                "recipientName": "  ",
                "recipientEmail": "jane@example.com",
                "parcelType": "Small Box",
                "isCOD": false,
                "pickupAddress": "12 Elm St",
                "deliveryAddress": "5 Oak Ave",
                "pickupLat": 23.81,
                "pickupLng": 90.41,
                "deliveryLat": 23.77,
                "deliveryLng": 90.40,
                "sender": Uuid::new_v4().to_string(),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sender_listing_returns_only_their_parcels() {
    let app = setup();
    let sender = Uuid::new_v4().to_string();
    let other = Uuid::new_v4().to_string();

    app.clone().oneshot(book_request(&sender)).await.unwrap();
    app.clone().oneshot(book_request(&other)).await.unwrap();

    let res = app
        .oneshot(get_request(&format!("/parcels/sender/{sender}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["sender"], sender);
}

#[tokio::test]
async fn assign_agent_then_agent_listing_sees_parcel() {
    let app = setup();

    let agent = register_user(&app, "Kamal", "kamal@example.com", "agent").await;
    let agent_id = agent["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(book_request(&Uuid::new_v4().to_string()))
        .await
        .unwrap();
    let parcel = body_json(res).await;
    let parcel_id = parcel["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/parcels/{parcel_id}/assign"),
            json!({ "assignedAgentId": agent_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let assigned = body_json(res).await;
    assert_eq!(assigned["assignedAgent"], agent_id);
    assert!(!assigned["assignedAt"].is_null());

    let res = app
        .oneshot(get_request(&format!("/parcels/agent/{agent_id}")))
        .await
        .unwrap();
    let body = body_json(res).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn assigning_a_non_agent_returns_400() {
    let app = setup();

    let customer = register_user(&app, "Jane", "jane@example.com", "customer").await;
    let customer_id = customer["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(book_request(&Uuid::new_v4().to_string()))
        .await
        .unwrap();
    let parcel = body_json(res).await;
    let parcel_id = parcel["id"].as_str().unwrap().to_string();

    let res = app
        .oneshot(json_request(
            "PUT",
            &format!("/parcels/{parcel_id}/assign"),
            json!({ "assignedAgentId": customer_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_update_stamps_delivered_at() {
    let app = setup();

    let res = app
        .clone()
        .oneshot(book_request(&Uuid::new_v4().to_string()))
        .await
        .unwrap();
    let parcel = body_json(res).await;
    let parcel_id = parcel["id"].as_str().unwrap().to_string();

    let res = app
        .oneshot(json_request(
            "PUT",
            &format!("/parcels/{parcel_id}/status"),
            json!({ "status": "Delivered" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["status"], "Delivered");
    assert!(!body["deliveredAt"].is_null());
}

#[tokio::test]
async fn any_target_status_is_accepted() {
    // no transition graph is enforced; Booked straight to Failed is allowed
    let app = setup();

    let res = app
        .clone()
        .oneshot(book_request(&Uuid::new_v4().to_string()))
        .await
        .unwrap();
    let parcel = body_json(res).await;
    let parcel_id = parcel["id"].as_str().unwrap().to_string();

    let res = app
        .oneshot(json_request(
            "PUT",
            &format!("/parcels/{parcel_id}/status"),
            json!({ "status": "Failed" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "Failed");
    assert!(body["deliveredAt"].is_null());
}

#[tokio::test]
async fn location_update_persists_and_broadcasts() {
    let state = test_state();
    let app = router(state.clone());
    let mut events = state.location_events_tx.subscribe();

    let res = app
        .clone()
        .oneshot(book_request(&Uuid::new_v4().to_string()))
        .await
        .unwrap();
    let parcel = body_json(res).await;
    let parcel_id = parcel["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/parcels/{parcel_id}/location"),
            json!({ "lat": 23.79, "lng": 90.405 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["parcelId"], parcel_id);
    assert_eq!(body["lat"], 23.79);

    let update = events.try_recv().unwrap();
    assert_eq!(update.parcel_id.to_string(), parcel_id);
    assert_eq!(update.lat, 23.79);
    assert_eq!(update.lng, 90.405);

    let res = app
        .oneshot(get_request(&format!("/parcels/{parcel_id}")))
        .await
        .unwrap();
    let body = body_json(res).await;
    assert_eq!(body["currentLocation"]["lat"], 23.79);
    assert_eq!(body["currentLocation"]["lng"], 90.405);
}

#[tokio::test]
async fn location_update_without_position_returns_503() {
    let app = setup();

    let res = app
        .clone()
        .oneshot(book_request(&Uuid::new_v4().to_string()))
        .await
        .unwrap();
    let parcel = body_json(res).await;
    let parcel_id = parcel["id"].as_str().unwrap().to_string();

    let res = app
        .oneshot(json_request(
            "PUT",
            &format!("/parcels/{parcel_id}/location"),
            json!({ "lat": 23.79 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn location_update_for_unknown_parcel_does_not_broadcast() {
    let state = test_state();
    let app = router(state.clone());
    let mut events = state.location_events_tx.subscribe();

    let missing = Uuid::new_v4();
    let res = app
        .oneshot(json_request(
            "PUT",
            &format!("/parcels/{missing}/location"),
            json!({ "lat": 23.79, "lng": 90.405 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn route_endpoint_includes_current_position() {
    let app = setup();

    let res = app
        .clone()
        .oneshot(book_request(&Uuid::new_v4().to_string()))
        .await
        .unwrap();
    let parcel = body_json(res).await;
    let parcel_id = parcel["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(get_request(&format!("/parcels/{parcel_id}/route")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["available"], true);
    assert_eq!(body["route"]["points"].as_array().unwrap().len(), 2);
    assert_eq!(body["route"]["center"]["lat"], 23.77);
    assert!(body["trackingUrl"]
        .as_str()
        .unwrap()
        .ends_with(&format!("/booking-history/{parcel_id}")));

    app.clone()
        .oneshot(json_request(
            "PUT",
            &format!("/parcels/{parcel_id}/location"),
            json!({ "lat": 23.79, "lng": 90.405 }),
        ))
        .await
        .unwrap();

    let res = app
        .oneshot(get_request(&format!("/parcels/{parcel_id}/route")))
        .await
        .unwrap();
    let body = body_json(res).await;
    let points = body["route"]["points"].as_array().unwrap();
    assert_eq!(points.len(), 3);
    assert_eq!(points[1]["lat"], 23.79);
    assert_eq!(body["route"]["center"]["lat"], 23.79);
}

#[tokio::test]
async fn route_is_unavailable_without_pickup_location() {
    let state = test_state();
    let app = router(state.clone());

    let parcel = Parcel {
        id: Uuid::new_v4(),
        sender: Uuid::new_v4(),
        assigned_agent: None,
        recipient_name: "Jane".to_string(),
        recipient_email: "jane@example.com".to_string(),
        parcel_type: "Small Box".to_string(),
        is_cod: false,
        status: ParcelStatus::Booked,
        pickup_address: "12 Elm St".to_string(),
        delivery_address: "5 Oak Ave".to_string(),
        pickup_location: None,
        delivery_location: Some(Coordinate {
            lat: 23.77,
            lng: 90.40,
        }),
        current_location: None,
        created_at: Utc::now(),
        assigned_at: None,
        delivered_at: None,
    };
    let parcel_id = parcel.id;
    state.parcels.insert(parcel_id, parcel);

    let res = app
        .oneshot(get_request(&format!("/parcels/{parcel_id}/route")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["available"], false);
    assert_eq!(body["message"], "Location data is missing");
    assert!(body["route"].is_null());
}

#[tokio::test]
async fn analytics_reflects_booked_parcels() {
    let app = setup();

    app.clone()
        .oneshot(book_request(&Uuid::new_v4().to_string()))
        .await
        .unwrap();
    app.clone()
        .oneshot(book_request(&Uuid::new_v4().to_string()))
        .await
        .unwrap();

    let res = app.oneshot(get_request("/parcels/analytics")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["parcelTypeStats"][0]["label"], "Small Box");
    assert_eq!(body["parcelTypeStats"][0]["count"], 2);
    assert_eq!(body["statusStats"][0]["label"], "Booked");
    assert_eq!(body["codVsPrepaid"][0]["label"], "Prepaid");
    assert_eq!(body["deliveryCompletionRate"], 0.0);
}

#[tokio::test]
async fn csv_report_has_fixed_header() {
    let app = setup();
    app.clone()
        .oneshot(book_request(&Uuid::new_v4().to_string()))
        .await
        .unwrap();

    let res = app.oneshot(get_request("/parcels/report.csv")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let content_type = res
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/csv"));

    let body = body_string(res).await;
    assert!(body.starts_with("ID,Recipient Name,Recipient Email,Status,Type,Payment Mode\n"));
    assert!(body.contains(",Jane,jane@example.com,Booked,Small Box,Prepaid"));
}

#[tokio::test]
async fn user_listing_never_exposes_password_hashes() {
    let app = setup();
    register_user(&app, "Jane", "jane@example.com", "customer").await;
    register_user(&app, "Kamal", "kamal@example.com", "agent").await;

    let res = app.oneshot(get_request("/user")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    for user in list {
        assert!(user.get("password_hash").is_none());
        assert!(user.get("passwordHash").is_none());
    }
}

#[tokio::test]
async fn get_nonexistent_parcel_returns_404() {
    let app = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/parcels/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
