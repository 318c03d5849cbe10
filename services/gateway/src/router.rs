use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/orders", post(handlers::place_order))
        .route(
            "/v1/orders/:order_id",
            delete(handlers::cancel_order).get(handlers::query_order),
        )
        .route(
            "/v1/accounts/:account_id/orders",
            get(handlers::list_account_orders),
        )
        .route(
            "/v1/accounts/:account_id/balances/:asset",
            get(handlers::get_balance),
        )
        .route("/v1/symbols/:symbol/trades", get(handlers::list_symbol_trades))
        .route("/healthz", get(handlers::health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
