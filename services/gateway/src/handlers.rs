use crate::error::ApiError;
use crate::models::{
    BalanceResponse, CancelOrderResponse, ListQuery, OrderScopeQuery, OrderViewDto, PlaceOrderDto,
    PlaceOrderResponse, QueryOrderResponse, TradeDto, TradeViewDto,
};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use engine::{
    payload_fingerprint, CommandEnvelope, CommandExecResult, CommandKind, CommandOutcome,
    CommandPayload, Engine, ErrorCode,
};
use ledger::{CancelIntent, PlaceIntent, TradeIntent};
use matching_engine::CommandResult;
use projection::{OrderRepository, TradeRepository};
use std::sync::Arc;
use types::numeric::{format_scaled, parse_scaled};
use types::order::{CancelOrderRequest, PlaceOrderRequest, QueryOrderRequest, Side};
use types::symbol::{self, SymbolSpec};
use types::{ids, now_nanos};

/// Every asset in the registry uses 6 decimal places.
const ASSET_SCALE: u32 = 6;

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /v1/orders
pub async fn place_order(
    State(state): State<AppState>,
    Json(dto): Json<PlaceOrderDto>,
) -> Result<Json<PlaceOrderResponse>, ApiError> {
    validate_place_dto(&dto)?;
    let side = Side::parse(&dto.side)
        .ok_or_else(|| ApiError::InvalidArgument("side must be BUY or SELL".into()))?;
    let spec = symbol::get(&dto.symbol).map_err(|e| ApiError::InvalidArgument(e.to_string()))?;
    let symbol = spec.symbol.to_string();

    let price = parse_scaled(&dto.price, spec.price_scale)
        .map_err(|e| ApiError::InvalidArgument(format!("invalid price: {}", e)))?;
    let quantity = parse_scaled(&dto.quantity, spec.quantity_scale)
        .map_err(|e| ApiError::InvalidArgument(format!("invalid quantity: {}", e)))?;
    if price % spec.price_tick != 0 {
        return Err(ApiError::InvalidArgument(
            "price must be a multiple of the price tick".into(),
        ));
    }
    if quantity % spec.qty_step != 0 {
        return Err(ApiError::InvalidArgument(
            "quantity must be a multiple of the quantity step".into(),
        ));
    }

    // Deterministic order id: retries of the same logical request map to
    // the same order across processes.
    let order_id = ids::order_id_for(&dto.account_id, &symbol, &dto.idempotency_key);

    // Reserve funds before the order reaches the book.
    state.ledger.check_and_freeze_for_place(&PlaceIntent {
        account_id: dto.account_id.clone(),
        order_id: order_id.clone(),
        symbol: symbol.clone(),
        side,
        price,
        quantity,
    })?;

    let request = PlaceOrderRequest {
        order_id: order_id.clone(),
        client_order_id: dto.client_order_id.clone(),
        account_id: dto.account_id.clone(),
        symbol: symbol.clone(),
        side,
        price,
        quantity,
    };
    let fingerprint = payload_fingerprint(&request)
        .map_err(|e| ApiError::Internal(format!("failed to fingerprint payload: {}", e)))?;
    let envelope = CommandEnvelope {
        command_id: ids::command_id(),
        command_kind: CommandKind::Place,
        idempotency_key: dto.idempotency_key.clone(),
        symbol: symbol.clone(),
        account_id: dto.account_id.clone(),
        payload_fingerprint: fingerprint,
        payload: CommandPayload::Place(request),
        created_at: now_nanos(),
    };

    let result = submit(state.engine.clone(), envelope).await;
    if !result.is_ok() {
        rollback_freeze(&state, &order_id, &dto.account_id, &symbol);
        return Err(ApiError::from_exec(&result));
    }
    let Some(CommandOutcome::Execution(execution)) = result.outcome else {
        rollback_freeze(&state, &order_id, &dto.account_id, &symbol);
        return Err(ApiError::Internal("invalid result type".into()));
    };

    settle_trades(&state, &execution);

    Ok(Json(build_place_response(
        order_id, &dto, spec, price, quantity, &execution,
    )))
}

/// DELETE /v1/orders/:order_id?account_id=&symbol=
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Query(scope): Query<OrderScopeQuery>,
) -> Result<Json<CancelOrderResponse>, ApiError> {
    if order_id.is_empty() {
        return Err(ApiError::InvalidArgument("order_id required".into()));
    }
    let spec = symbol::get(&scope.symbol).map_err(|e| ApiError::InvalidArgument(e.to_string()))?;
    let symbol = spec.symbol.to_string();

    let request = CancelOrderRequest {
        order_id: order_id.clone(),
        account_id: scope.account_id.clone(),
        symbol: symbol.clone(),
    };
    let fingerprint = payload_fingerprint(&request)
        .map_err(|e| ApiError::Internal(format!("failed to fingerprint payload: {}", e)))?;
    let envelope = CommandEnvelope {
        command_id: ids::command_id(),
        command_kind: CommandKind::Cancel,
        idempotency_key: format!("cancel_{}_{}", scope.account_id, order_id),
        symbol: symbol.clone(),
        account_id: scope.account_id.clone(),
        payload_fingerprint: fingerprint,
        payload: CommandPayload::Cancel(request),
        created_at: now_nanos(),
    };

    let result = submit(state.engine.clone(), envelope).await;
    if !result.is_ok() {
        return Err(ApiError::from_exec(&result));
    }
    let Some(CommandOutcome::Execution(execution)) = result.outcome else {
        return Err(ApiError::Internal("invalid result type".into()));
    };

    // Give the residual freeze back. The order is already canceled on the
    // book, so a release failure is logged rather than failing the request.
    if let Err(err) = state.ledger.release_on_cancel(&CancelIntent {
        account_id: scope.account_id.clone(),
        order_id: order_id.clone(),
        symbol,
    }) {
        tracing::error!(%order_id, error = %err, "release after cancel failed");
    }

    let (status, remaining_qty, filled_qty) = match execution.status_changes.last() {
        Some(change) => (
            change.new_status.to_string(),
            change.remaining_qty,
            change.filled_qty,
        ),
        None => ("CANCELED".to_string(), 0, 0),
    };
    Ok(Json(CancelOrderResponse {
        order_id,
        status,
        remaining_qty: format_scaled(remaining_qty, spec.quantity_scale),
        filled_qty: format_scaled(filled_qty, spec.quantity_scale),
    }))
}

/// GET /v1/orders/:order_id?account_id=&symbol=
pub async fn query_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Query(scope): Query<OrderScopeQuery>,
) -> Result<Json<QueryOrderResponse>, ApiError> {
    if order_id.is_empty() {
        return Err(ApiError::InvalidArgument("order_id required".into()));
    }
    let spec = symbol::get(&scope.symbol).map_err(|e| ApiError::InvalidArgument(e.to_string()))?;
    let symbol = spec.symbol.to_string();

    let request = QueryOrderRequest {
        order_id: order_id.clone(),
        account_id: scope.account_id.clone(),
        symbol: symbol.clone(),
    };
    let fingerprint = payload_fingerprint(&request)
        .map_err(|e| ApiError::Internal(format!("failed to fingerprint payload: {}", e)))?;
    let envelope = CommandEnvelope {
        command_id: ids::command_id(),
        command_kind: CommandKind::Query,
        // Queries are read-only; a unique key keeps them out of replay
        // collisions with mutating commands.
        idempotency_key: format!("query_{}_{}_{}", scope.account_id, order_id, now_nanos()),
        symbol,
        account_id: scope.account_id.clone(),
        payload_fingerprint: fingerprint,
        payload: CommandPayload::Query(request),
        created_at: now_nanos(),
    };

    let result = submit(state.engine.clone(), envelope).await;
    if !result.is_ok() {
        return Err(ApiError::from_exec(&result));
    }
    let Some(CommandOutcome::Order(snapshot)) = result.outcome else {
        return Err(ApiError::Internal("invalid result type".into()));
    };

    Ok(Json(QueryOrderResponse {
        order_id: snapshot.order_id,
        client_order_id: snapshot.client_order_id,
        account_id: snapshot.account_id,
        symbol: snapshot.symbol,
        side: snapshot.side.map(|s| s.to_string()),
        price: format_scaled(snapshot.price, spec.price_scale),
        quantity: format_scaled(snapshot.quantity, spec.quantity_scale),
        remaining_qty: format_scaled(snapshot.remaining_qty, spec.quantity_scale),
        filled_qty: format_scaled(snapshot.filled_qty, spec.quantity_scale),
        status: snapshot.status.to_string(),
        created_at: snapshot.created_at,
    }))
}

/// GET /v1/accounts/:account_id/balances/:asset
pub async fn get_balance(
    State(state): State<AppState>,
    Path((account_id, asset)): Path<(String, String)>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.ledger.balance(&account_id, &asset)?;
    Ok(Json(BalanceResponse {
        account_id,
        asset,
        available: format_scaled(balance.available, ASSET_SCALE),
        frozen: format_scaled(balance.frozen, ASSET_SCALE),
    }))
}

/// GET /v1/accounts/:account_id/orders
pub async fn list_account_orders(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderViewDto>>, ApiError> {
    let limit = query.limit.unwrap_or(100);
    let orders = state
        .order_views
        .list_by_account(&account_id, limit)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let views = orders
        .into_iter()
        .map(|order| {
            let (price_scale, qty_scale) = scales_for(&order.symbol);
            OrderViewDto {
                order_id: order.order_id,
                client_order_id: order.client_order_id,
                symbol: order.symbol,
                side: order.side,
                price: format_scaled(order.price, price_scale),
                quantity: format_scaled(order.quantity, qty_scale),
                remaining_qty: format_scaled(order.remaining_qty, qty_scale),
                filled_qty: format_scaled(order.filled_qty, qty_scale),
                status: order.status.to_string(),
                updated_at: order.updated_at,
            }
        })
        .collect();
    Ok(Json(views))
}

/// GET /v1/symbols/:symbol/trades
pub async fn list_symbol_trades(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TradeViewDto>>, ApiError> {
    let spec = symbol::get(&symbol).map_err(|e| ApiError::InvalidArgument(e.to_string()))?;
    let trades = state
        .trade_views
        .list_by_symbol(
            spec.symbol,
            query.from_sequence.unwrap_or(0),
            query.limit.unwrap_or(100),
        )
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let views = trades
        .into_iter()
        .map(|trade| TradeViewDto {
            trade_id: trade.trade_id,
            symbol: trade.symbol,
            maker_order_id: trade.maker_order_id,
            taker_order_id: trade.taker_order_id,
            price: format_scaled(trade.price, spec.price_scale),
            quantity: format_scaled(trade.quantity, spec.quantity_scale),
            occurred_at: trade.occurred_at,
            sequence: trade.sequence,
        })
        .collect();
    Ok(Json(views))
}

// Helpers

async fn submit(engine: Arc<Engine>, envelope: CommandEnvelope) -> CommandExecResult {
    tokio::task::spawn_blocking(move || engine.submit(envelope))
        .await
        .unwrap_or_else(|_| {
            CommandExecResult::failed(ErrorCode::InternalError, "engine task failed")
        })
}

fn validate_place_dto(dto: &PlaceOrderDto) -> Result<(), ApiError> {
    let required = [
        ("client_order_id", &dto.client_order_id),
        ("account_id", &dto.account_id),
        ("symbol", &dto.symbol),
        ("side", &dto.side),
        ("price", &dto.price),
        ("quantity", &dto.quantity),
        ("idempotency_key", &dto.idempotency_key),
    ];
    for (name, value) in required {
        if value.is_empty() {
            return Err(ApiError::InvalidArgument(format!("{} required", name)));
        }
    }
    Ok(())
}

fn rollback_freeze(state: &AppState, order_id: &str, account_id: &str, symbol: &str) {
    let _ = state.ledger.release_on_cancel(&CancelIntent {
        account_id: account_id.to_string(),
        order_id: order_id.to_string(),
        symbol: symbol.to_string(),
    });
}

/// Apply every trade of a command to the ledger. The book has already
/// matched; a settlement failure here is an inconsistency to surface, not
/// a reason to fail the request.
fn settle_trades(state: &AppState, execution: &CommandResult) {
    for trade in &execution.trades {
        let (buyer_account, buyer_order, seller_account, seller_order) =
            if trade.maker_side == Side::Buy {
                (
                    &trade.maker_account_id,
                    &trade.maker_order_id,
                    &trade.taker_account_id,
                    &trade.taker_order_id,
                )
            } else {
                (
                    &trade.taker_account_id,
                    &trade.taker_order_id,
                    &trade.maker_account_id,
                    &trade.maker_order_id,
                )
            };
        let intent = TradeIntent {
            trade_id: trade.trade_id.clone(),
            buyer_account_id: buyer_account.clone(),
            seller_account_id: seller_account.clone(),
            buyer_order_id: buyer_order.clone(),
            seller_order_id: seller_order.clone(),
            symbol: trade.symbol.clone(),
            price: trade.price,
            quantity: trade.quantity,
        };
        if let Err(err) = state.ledger.apply_trade(&intent) {
            tracing::error!(trade_id = %trade.trade_id, error = %err, "trade settlement failed");
        }
    }
}

fn build_place_response(
    order_id: String,
    dto: &PlaceOrderDto,
    spec: &SymbolSpec,
    price: i64,
    quantity: i64,
    execution: &CommandResult,
) -> PlaceOrderResponse {
    let status = execution
        .status_changes
        .last()
        .map(|change| change.new_status.to_string())
        .unwrap_or_else(|| "NEW".to_string());

    let trades = execution
        .trades
        .iter()
        .map(|trade| {
            let side = if trade.taker_order_id == order_id {
                trade.taker_side
            } else {
                trade.maker_side
            };
            TradeDto {
                trade_id: trade.trade_id.clone(),
                price: format_scaled(trade.price, spec.price_scale),
                quantity: format_scaled(trade.quantity, spec.quantity_scale),
                side: side.to_string(),
                occurred_at: trade.occurred_at,
            }
        })
        .collect();

    PlaceOrderResponse {
        order_id,
        client_order_id: dto.client_order_id.clone(),
        account_id: dto.account_id.clone(),
        symbol: spec.symbol.to_string(),
        side: dto.side.clone(),
        price: format_scaled(price, spec.price_scale),
        quantity: format_scaled(quantity, spec.quantity_scale),
        status,
        created_at: now_nanos(),
        trades,
    }
}

fn scales_for(symbol: &str) -> (u32, u32) {
    match symbol::get(symbol) {
        Ok(spec) => (spec.price_scale, spec.quantity_scale),
        Err(_) => (ASSET_SCALE, ASSET_SCALE),
    }
}
