//! Order and inventory messaging over the `orders` and `inventory` queues.

use crate::{
    models::{
        envelope::{AckToken, QueueEnvelope},
        order::Order,
    },
    storage::{
        StorageAccount, StorageError, StorageResult,
        queue::{QueueClient, QueueMessage},
    },
};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const ORDER_QUEUE: &str = "orders";
pub const INVENTORY_QUEUE: &str = "inventory";

/// Queue adapter. Receiving claims one message for the visibility window;
/// callers acknowledge with the envelope's [`AckToken`] or the message is
/// delivered again once the window lapses.
#[derive(Clone)]
pub struct QueueService {
    orders: QueueClient,
    inventory: QueueClient,
    visibility: Duration,
}

impl QueueService {
    /// Build the adapter and make sure both queues exist. A failure here is
    /// logged and otherwise ignored.
    pub async fn new(account: &StorageAccount, visibility: Duration) -> Self {
        let service = Self {
            orders: account.queue_client(ORDER_QUEUE),
            inventory: account.queue_client(INVENTORY_QUEUE),
            visibility,
        };
        for queue in [&service.orders, &service.inventory] {
            match queue.create_if_not_exists().await {
                Ok(true) => info!("Created queue {}", queue.name()),
                Ok(false) => {}
                Err(err) => warn!("Error initializing queue {}: {}", queue.name(), err),
            }
        }
        service
    }

    fn envelope<T>(message: QueueMessage, payload: T) -> QueueEnvelope<T> {
        QueueEnvelope {
            payload,
            ack_token: AckToken::new(message.message_id, message.pop_receipt),
            dequeue_count: message.dequeue_count,
            inserted_on: message.inserted_on,
            next_visible_on: message.next_visible_on,
        }
    }

    // --- Orders ---

    pub async fn send_order(&self, order: &Order) -> StorageResult<String> {
        let body = serde_json::to_string(order)?;
        let message_id = self.orders.send(&body).await?;
        info!(
            order_id = %order.order_id,
            total_amount = %order.total_amount,
            %message_id,
            "Sent order to queue"
        );
        Ok(message_id)
    }

    /// Claim the next order. A body that is not a valid order is reported as
    /// `Malformed`; the message stays queued and reappears after the window.
    pub async fn receive_order(&self) -> StorageResult<Option<QueueEnvelope<Order>>> {
        let Some(message) = self.orders.receive(self.visibility).await? else {
            return Ok(None);
        };
        let order: Order =
            serde_json::from_str(&message.body).map_err(|source| StorageError::Malformed {
                message_id: message.message_id.clone(),
                source,
            })?;
        debug!(order_id = %order.order_id, total_amount = %order.total_amount, "Received order");
        Ok(Some(Self::envelope(message, order)))
    }

    pub async fn delete_order(&self, token: &AckToken) -> StorageResult<()> {
        self.orders
            .delete(&token.message_id, &token.pop_receipt)
            .await
    }

    pub async fn order_queue_length(&self) -> StorageResult<i64> {
        self.orders.approximate_count().await
    }

    // --- Inventory ---

    pub async fn send_inventory(&self, content: &str) -> StorageResult<String> {
        self.inventory.send(content).await
    }

    pub async fn receive_inventory(&self) -> StorageResult<Option<QueueEnvelope<String>>> {
        Ok(self
            .inventory
            .receive(self.visibility)
            .await?
            .map(|message| {
                let body = message.body.clone();
                Self::envelope(message, body)
            }))
    }

    pub async fn delete_inventory(&self, token: &AckToken) -> StorageResult<()> {
        self.inventory
            .delete(&token.message_id, &token.pop_receipt)
            .await
    }

    pub async fn inventory_queue_length(&self) -> StorageResult<i64> {
        self.inventory.approximate_count().await
    }
}
