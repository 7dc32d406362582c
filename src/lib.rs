pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod hash;
pub mod middleware;
pub mod services;
pub mod startup;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::gateway::GatewayClient;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub gateway: GatewayClient,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments", post(handlers::payments::initiate_payment))
        .route("/payments/:txnid", get(handlers::payments::get_payment))
        .route(
            "/payments/:txnid/refund",
            post(handlers::payments::refund_payment),
        )
        .route("/webhook", post(handlers::webhook::webhook))
        .route(
            "/payment/response/success",
            post(handlers::redirect::payment_success),
        )
        .route(
            "/payment/response/failure",
            post(handlers::redirect::payment_failure),
        )
        .route("/api-docs/openapi.json", get(handlers::openapi_spec))
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
