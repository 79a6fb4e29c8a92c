//! HTTP adapter for the bakery backend.
//!
//! A thin JSON layer over [`fulfillment::Fulfillment`]: cart, checkout,
//! orders, loyalty and delivery routes, plus `/health` and a Prometheus
//! `/metrics` endpoint. The caller's identity comes from the `x-user-id` and
//! `x-user-role` headers set by the gateway in front of this service.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;
pub use identity::Identity;
pub use state::AppState;

/// Builds the router over `state`.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{admin, cart, checkout, deliveries, loyalty, orders};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(cart::get::<S>).delete(cart::clear::<S>))
        .route("/cart/items", post(cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            axum::routing::patch(cart::update_quantity::<S>).delete(cart::remove_item::<S>),
        )
        .route("/cart/delivery", put(cart::set_delivery::<S>))
        .route("/cart/payment", put(cart::set_payment::<S>))
        .route("/carts/{user_id}/discount", put(cart::set_discount::<S>))
        .route("/checkout", post(checkout::checkout::<S>))
        .route("/orders", get(orders::list::<S>))
        .route("/orders/{id}", get(orders::get::<S>))
        .route("/orders/{id}/events", get(orders::events::<S>))
        .route("/orders/{id}/status", post(orders::update_status::<S>))
        .route("/orders/{id}/payment", post(orders::update_payment::<S>))
        .route("/orders/{id}/adjustment", post(orders::apply_adjustment::<S>))
        .route("/loyalty", get(loyalty::account::<S>))
        .route("/loyalty/rewards", get(loyalty::rewards))
        .route("/loyalty/rewards/{reward_id}/redeem", post(loyalty::redeem::<S>))
        .route("/loyalty/accounts/{user_id}", get(loyalty::account_of::<S>))
        .route("/loyalty/accounts/{user_id}/adjust", post(loyalty::adjust::<S>))
        .route("/loyalty/accounts/{user_id}/bonus", post(loyalty::bonus::<S>))
        .route("/loyalty/accounts/{user_id}/expire", post(loyalty::expire::<S>))
        .route("/deliveries/board", get(deliveries::board::<S>))
        .route("/deliveries/{id}", get(deliveries::get::<S>))
        .route("/deliveries/{id}/assign", post(deliveries::assign::<S>))
        .route("/deliveries/{id}/location", post(deliveries::update_location::<S>))
        .route("/deliveries/{id}/pickup", post(deliveries::pick_up::<S>))
        .route("/deliveries/{id}/complete", post(deliveries::complete::<S>))
        .route("/deliveries/{id}/fail", post(deliveries::fail::<S>))
        .route("/deliveries/{id}/cancel", post(deliveries::cancel::<S>))
        .route("/catalog/{product_id}", put(admin::put_product::<S>))
        .route("/directory/{user_id}", put(admin::put_role::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
