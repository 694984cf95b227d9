//! Order placement and processing over the `orders` queue, plus the
//! `inventory` queue.

use crate::{
    errors::AppError,
    handlers::product_handlers::find_product,
    models::{
        envelope::AckToken,
        order::{Order, OrderDraft, OrderStatus},
    },
    services::StorageResultExt,
    state::AppState,
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

const EMPTY_ORDER_QUEUE: &str = "No orders in the queue.";
const EMPTY_INVENTORY_QUEUE: &str = "No inventory updates in the queue.";

/// Fields a client may set when placing an order. Names, totals and status
/// are never taken from the client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub shipping_address: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckRequest {
    pub ack_token: String,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueLength {
    queue_length: i64,
}

/// `GET /orders`: approximate order queue length, `-1` when unknown.
pub async fn order_queue_length(State(state): State<AppState>) -> impl IntoResponse {
    let queue_length = state
        .queues
        .order_queue_length()
        .await
        .or_degrade(-1, "order queue length");
    Json(QueueLength { queue_length })
}

/// `POST /orders`
pub async fn place_order(
    State(state): State<AppState>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.customer_id.trim().is_empty() || req.product_id.trim().is_empty() {
        return Err(AppError::bad_request(
            "missing required fields: customerId, productId",
        ));
    }
    if req.quantity <= 0 {
        return Err(AppError::bad_request("quantity must be at least 1"));
    }

    let customer = state
        .tables
        .get_customer(&req.customer_id)
        .await
        .optional()?;
    let product = find_product(&state, &req.product_id).await;
    let (Some(customer), Some(product)) = (customer, product) else {
        return Err(AppError::bad_request("Invalid customer or product selected."));
    };

    let order = Order::place(
        OrderDraft {
            quantity: req.quantity,
            shipping_address: req.shipping_address,
            payment_method: req.payment_method,
            notes: req.notes,
        },
        &customer,
        &product,
    )?;
    state.queues.send_order(&order).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `POST /orders/process`: claim the next order for the visibility window.
pub async fn process_order(State(state): State<AppState>) -> Result<Response, AppError> {
    Ok(match state.queues.receive_order().await? {
        Some(envelope) => Json(envelope).into_response(),
        None => Json(json!({ "message": EMPTY_ORDER_QUEUE })).into_response(),
    })
}

/// `POST /orders/complete`: acknowledge a claimed order so it is not
/// delivered again.
pub async fn complete_order(
    State(state): State<AppState>,
    Json(req): Json<AckRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = AckToken::decode(&req.ack_token)?;
    state.queues.delete_order(&token).await?;
    let status = req.status.unwrap_or(OrderStatus::Completed);
    info!(message_id = %token.message_id, ?status, "Completed order");
    Ok(Json(json!({ "completed": true, "status": status })))
}

/// `GET /inventory`: approximate inventory queue length, `-1` when unknown.
pub async fn inventory_queue_length(State(state): State<AppState>) -> impl IntoResponse {
    let queue_length = state
        .queues
        .inventory_queue_length()
        .await
        .or_degrade(-1, "inventory queue length");
    Json(QueueLength { queue_length })
}

/// `POST /inventory`: enqueue the request body as-is.
pub async fn send_inventory(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    if body.trim().is_empty() {
        return Err(AppError::bad_request("inventory message cannot be empty"));
    }
    let message_id = state.queues.send_inventory(&body).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "messageId": message_id })),
    ))
}

/// `POST /inventory/receive`
pub async fn receive_inventory(State(state): State<AppState>) -> Result<Response, AppError> {
    Ok(match state.queues.receive_inventory().await? {
        Some(envelope) => Json(envelope).into_response(),
        None => Json(json!({ "message": EMPTY_INVENTORY_QUEUE })).into_response(),
    })
}

/// `POST /inventory/ack`
pub async fn ack_inventory(
    State(state): State<AppState>,
    Json(req): Json<AckRequest>,
) -> Result<StatusCode, AppError> {
    let token = AckToken::decode(&req.ack_token)?;
    state.queues.delete_inventory(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}
