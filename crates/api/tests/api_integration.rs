//! Drives the router end to end with `oneshot` requests.

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use common::{FixedClock, UserId};
use domain::Settings;
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn app() -> Router {
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 9, 18, 10, 0, 0).unwrap());
    let state = api::AppState::new(
        InMemoryEventStore::new(),
        Settings::default(),
        Arc::new(clock),
    );
    api::create_app(Arc::new(state), metrics_handle())
}

struct Caller {
    id: UserId,
    role: &'static str,
}

impl Caller {
    fn new(role: &'static str) -> Self {
        Self {
            id: UserId::new(),
            role,
        }
    }
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    caller: Option<&Caller>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        request = request
            .header("x-user-id", caller.id.to_string())
            .header("x-user-role", caller.role);
    }
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn stock_shop(app: &Router, staff: &Caller) {
    for (id, name, price) in [("pastel-de-nata", "Pastel de Nata", "1.50"), ("broa", "Broa", "4.00")] {
        let (status, _) = send(
            app,
            "PUT",
            &format!("/catalog/{id}"),
            Some(staff),
            Some(json!({ "name": name, "price": price })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}

async fn fill_cart(app: &Router, customer: &Caller, quantity: i32) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/cart/items",
        Some(customer),
        Some(json!({
            "product_id": "pastel-de-nata",
            "product_name": "Pastel de Nata",
            "quantity": quantity,
            "unit_price": "1.50"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn health_check() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn metrics_are_rendered() {
    let app = app();
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn requests_without_identity_are_rejected() {
    let app = app();
    let (status, body) = send(&app, "GET", "/cart", None, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("x-user-id"));
}

#[tokio::test]
async fn the_system_role_cannot_be_claimed() {
    let app = app();
    let (status, _) = send(&app, "GET", "/cart", Some(&Caller::new("system")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn cart_reports_its_totals() {
    let app = app();
    let customer = Caller::new("customer");

    let body = fill_cart(&app, &customer, 2).await;

    assert_eq!(body["cart"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["totals"]["subtotal"], "3.00");
}

#[tokio::test]
async fn customers_cannot_edit_the_catalog() {
    let app = app();
    let (status, body) = send(
        &app,
        "PUT",
        "/catalog/broa",
        Some(&Caller::new("customer")),
        Some(json!({ "name": "Broa", "price": "0.01" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn checkout_creates_an_order_and_empties_the_cart() {
    let app = app();
    let staff = Caller::new("staff");
    let customer = Caller::new("customer");
    stock_shop(&app, &staff).await;
    fill_cart(&app, &customer, 2).await;

    let (status, order) = send(&app, "POST", "/checkout", Some(&customer), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["order_number"], "SP260918001");
    assert_eq!(order["status"], "pending");

    let (_, cart) = send(&app, "GET", "/cart", Some(&customer), None).await;
    assert!(cart["cart"]["items"].as_array().unwrap().is_empty());

    let (status, history) = send(&app, "GET", "/orders", Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["id"], order["id"]);
}

#[tokio::test]
async fn checkout_with_unknown_products_is_unprocessable() {
    let app = app();
    let customer = Caller::new("customer");
    fill_cart(&app, &customer, 1).await;

    let (status, body) = send(&app, "POST", "/checkout", Some(&customer), None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("Pastel de Nata"));
}

#[tokio::test]
async fn redeeming_more_points_than_held_is_unprocessable() {
    let app = app();
    let staff = Caller::new("staff");
    let customer = Caller::new("customer");
    stock_shop(&app, &staff).await;
    fill_cart(&app, &customer, 2).await;
    send(
        &app,
        "PUT",
        "/cart/payment",
        Some(&customer),
        Some(json!({ "method": "card", "loyalty_points_used": 50 })),
    )
    .await;

    let (status, _) = send(&app, "POST", "/checkout", Some(&customer), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn orders_of_other_customers_are_hidden() {
    let app = app();
    let staff = Caller::new("staff");
    let owner = Caller::new("customer");
    stock_shop(&app, &staff).await;
    fill_cart(&app, &owner, 1).await;
    let (_, order) = send(&app, "POST", "/checkout", Some(&owner), None).await;
    let uri = format!("/orders/{}", order["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &uri, Some(&Caller::new("customer")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &uri, Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn illegal_transitions_conflict() {
    let app = app();
    let staff = Caller::new("staff");
    let customer = Caller::new("customer");
    stock_shop(&app, &staff).await;
    fill_cart(&app, &customer, 1).await;
    let (_, order) = send(&app, "POST", "/checkout", Some(&customer), None).await;
    let uri = format!("/orders/{}/status", order["id"].as_str().unwrap());

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(&staff),
        Some(json!({ "status": "ready" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn delivery_order_from_checkout_to_doorstep() {
    let app = app();
    let admin = Caller::new("admin");
    let staff = Caller::new("staff");
    let customer = Caller::new("customer");
    let driver = Caller::new("driver");
    stock_shop(&app, &staff).await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/directory/{}", driver.id),
        Some(&admin),
        Some(json!({ "role": "driver" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    fill_cart(&app, &customer, 4).await;
    let (status, _) = send(
        &app,
        "PUT",
        "/cart/delivery",
        Some(&customer),
        Some(json!({
            "type": "delivery",
            "address": {
                "street": "Rua da Prata 80",
                "city": "Lisboa",
                "postal_code": "1100-420",
                "coordinates": { "lat": 38.7115, "lng": -9.1365 }
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, order) = send(&app, "POST", "/checkout", Some(&customer), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let order_uri = format!("/orders/{}", order["id"].as_str().unwrap());

    for next in ["confirmed", "preparing", "ready"] {
        let (status, _) = send(
            &app,
            "POST",
            &format!("{order_uri}/status"),
            Some(&staff),
            Some(json!({ "status": next })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "moving to {next}");
    }

    let (_, order) = send(&app, "GET", &order_uri, Some(&customer), None).await;
    let delivery_uri = format!("/deliveries/{}", order["delivery_id"].as_str().unwrap());

    let (_, queue) = send(&app, "GET", "/deliveries/board", Some(&staff), None).await;
    assert_eq!(queue.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "POST",
        &format!("{delivery_uri}/assign"),
        Some(&staff),
        Some(json!({ "driver_id": driver.id.to_string() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, board) = send(&app, "GET", "/deliveries/board", Some(&driver), None).await;
    assert_eq!(board.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "POST", &format!("{delivery_uri}/pickup"), Some(&driver), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, order) = send(&app, "GET", &order_uri, Some(&customer), None).await;
    assert_eq!(order["status"], "out_for_delivery");

    let (status, _) = send(
        &app,
        "POST",
        &format!("{delivery_uri}/location"),
        Some(&driver),
        Some(json!({ "lat": 38.7150, "lng": -9.1380, "accuracy": 8.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, delivery) = send(
        &app,
        "POST",
        &format!("{delivery_uri}/complete"),
        Some(&driver),
        Some(json!({ "notes": "Left with the concierge" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivery["status"], "delivered");

    let (_, order) = send(&app, "GET", &order_uri, Some(&customer), None).await;
    assert_eq!(order["status"], "delivered");

    let (_, account) = send(&app, "GET", "/loyalty", Some(&customer), None).await;
    assert!(account["points"]["current"].as_u64().unwrap() > 0);

    let (_, board) = send(&app, "GET", "/deliveries/board", Some(&driver), None).await;
    assert!(board.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rewards_are_listed() {
    let app = app();
    let (status, body) = send(&app, "GET", "/loyalty/rewards", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body["rewards"].as_array().unwrap().is_empty());
}
