//! Queues with visibility windows and pop receipts (at-least-once delivery).

use super::{StorageAccount, StorageError, StorageResult, ensure_resource_name};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Longest visibility window a claim can hold. Longer requests are clamped.
pub const MAX_VISIBILITY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A message claimed by [`QueueClient::receive`].
///
/// The message stays in the queue, invisible until `next_visible_on`. Only
/// `pop_receipt` (issued by this claim) can delete it; a later claim issues a
/// new receipt and invalidates this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub pop_receipt: String,
    pub body: String,
    pub dequeue_count: i64,
    pub inserted_on: DateTime<Utc>,
    pub next_visible_on: DateTime<Utc>,
}

#[derive(FromRow)]
struct ClaimedRow {
    message_id: String,
    body: String,
    dequeue_count: i64,
    inserted_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct QueueClient {
    account: StorageAccount,
    name: String,
}

impl QueueClient {
    pub(crate) fn new(account: StorageAccount, name: &str) -> Self {
        Self {
            account,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` when the queue did not exist before.
    pub async fn create_if_not_exists(&self) -> StorageResult<bool> {
        ensure_resource_name("queue", &self.name)?;
        let result = sqlx::query("INSERT OR IGNORE INTO queues (name, created_at) VALUES (?, ?)")
            .bind(&self.name)
            .bind(Utc::now())
            .execute(self.account.db()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn exists(&self) -> StorageResult<bool> {
        let found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM queues WHERE name = ?")
            .bind(&self.name)
            .fetch_one(self.account.db()?)
            .await?;
        Ok(found > 0)
    }

    async fn ensure_exists(&self) -> StorageResult<()> {
        if self.exists().await? {
            Ok(())
        } else {
            Err(StorageError::not_found("queue", &self.name))
        }
    }

    /// Enqueue `body`, visible immediately. Returns the message id.
    pub async fn send(&self, body: &str) -> StorageResult<String> {
        self.ensure_exists().await?;
        let message_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO queue_messages (queue, message_id, body, inserted_at, visible_at_ms)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&self.name)
        .bind(&message_id)
        .bind(body)
        .bind(now)
        .bind(now.timestamp_millis())
        .execute(self.account.db()?)
        .await?;
        debug!(queue = %self.name, %message_id, "enqueued message");
        Ok(message_id)
    }

    /// Claim the oldest visible message for `visibility`.
    ///
    /// The claim is one `UPDATE ... RETURNING` statement, so concurrent
    /// receivers never hold the same delivery.
    pub async fn receive(&self, visibility: Duration) -> StorageResult<Option<QueueMessage>> {
        self.ensure_exists().await?;
        let now = Utc::now();
        let visibility = chrono::Duration::from_std(visibility.min(MAX_VISIBILITY))
            .unwrap_or_else(|_| chrono::Duration::days(7));
        let next_visible_on = now.checked_add_signed(visibility).unwrap_or(now);
        let pop_receipt = Uuid::new_v4().simple().to_string();

        let claimed = sqlx::query_as::<_, ClaimedRow>(
            "UPDATE queue_messages
             SET visible_at_ms = ?, pop_receipt = ?, dequeue_count = dequeue_count + 1
             WHERE seq = (
                 SELECT seq FROM queue_messages
                 WHERE queue = ? AND visible_at_ms <= ?
                 ORDER BY seq ASC
                 LIMIT 1
             )
             RETURNING message_id, body, dequeue_count, inserted_at",
        )
        .bind(next_visible_on.timestamp_millis())
        .bind(&pop_receipt)
        .bind(&self.name)
        .bind(now.timestamp_millis())
        .fetch_optional(self.account.db()?)
        .await?;

        Ok(claimed.map(|row| {
            debug!(
                queue = %self.name,
                message_id = %row.message_id,
                dequeue_count = row.dequeue_count,
                "claimed message"
            );
            QueueMessage {
                message_id: row.message_id,
                pop_receipt,
                body: row.body,
                dequeue_count: row.dequeue_count,
                inserted_on: row.inserted_at,
                next_visible_on,
            }
        }))
    }

    /// Delete the delivery identified by `message_id` and `pop_receipt`.
    /// A stale receipt or an already-deleted message is `NotFound`.
    pub async fn delete(&self, message_id: &str, pop_receipt: &str) -> StorageResult<()> {
        self.ensure_exists().await?;
        let result = sqlx::query(
            "DELETE FROM queue_messages WHERE queue = ? AND message_id = ? AND pop_receipt = ?",
        )
        .bind(&self.name)
        .bind(message_id)
        .bind(pop_receipt)
        .execute(self.account.db()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("message", message_id));
        }
        debug!(queue = %self.name, message_id, "deleted message");
        Ok(())
    }

    /// Messages currently held, visible or not.
    pub async fn approximate_count(&self) -> StorageResult<i64> {
        self.ensure_exists().await?;
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM queue_messages WHERE queue = ?")
                .bind(&self.name)
                .fetch_one(self.account.db()?)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_account;

    const LONG: Duration = Duration::from_secs(60);

    async fn jobs() -> (tempfile::TempDir, QueueClient) {
        let (dir, account) = temp_account().await;
        let queue = account.queue_client("jobs");
        assert!(queue.create_if_not_exists().await.unwrap());
        (dir, queue)
    }

    #[tokio::test]
    async fn receive_is_fifo_and_hides_claimed_messages() {
        let (_dir, queue) = jobs().await;
        queue.send("one").await.unwrap();
        queue.send("two").await.unwrap();

        let first = queue.receive(LONG).await.unwrap().unwrap();
        assert_eq!(first.body, "one");
        assert_eq!(first.dequeue_count, 1);

        let second = queue.receive(LONG).await.unwrap().unwrap();
        assert_eq!(second.body, "two");

        assert!(queue.receive(LONG).await.unwrap().is_none());
        assert_eq!(queue.approximate_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn oversized_visibility_is_clamped_to_seven_days() {
        let (_dir, queue) = jobs().await;
        queue.send("parked").await.unwrap();

        let before = Utc::now();
        let msg = queue.receive(Duration::MAX).await.unwrap().unwrap();
        let window = msg.next_visible_on - before;
        assert!(window <= chrono::Duration::days(7) + chrono::Duration::seconds(5));
        assert!(window >= chrono::Duration::days(7) - chrono::Duration::seconds(5));
        assert!(queue.receive(LONG).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn receive_then_delete_removes_permanently() {
        let (_dir, queue) = jobs().await;
        queue.send("payload").await.unwrap();

        let msg = queue.receive(Duration::ZERO).await.unwrap().unwrap();
        queue.delete(&msg.message_id, &msg.pop_receipt).await.unwrap();

        assert!(queue.receive(Duration::ZERO).await.unwrap().is_none());
        assert_eq!(queue.approximate_count().await.unwrap(), 0);
        assert!(
            queue
                .delete(&msg.message_id, &msg.pop_receipt)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn undeleted_message_is_redelivered_after_visibility_window() {
        let (_dir, queue) = jobs().await;
        let id = queue.send("payload").await.unwrap();

        let first = queue
            .receive(Duration::from_millis(50))
            .await
            .unwrap()
            .unwrap();
        assert!(queue.receive(LONG).await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(120)).await;

        let second = queue.receive(LONG).await.unwrap().unwrap();
        assert_eq!(second.message_id, id);
        assert_eq!(second.dequeue_count, 2);
        assert_ne!(second.pop_receipt, first.pop_receipt);

        let stale = queue.delete(&id, &first.pop_receipt).await.unwrap_err();
        assert!(stale.is_not_found());
        queue.delete(&id, &second.pop_receipt).await.unwrap();
    }

    #[tokio::test]
    async fn queues_are_isolated() {
        let (_dir, account) = temp_account().await;
        let orders = account.queue_client("orders");
        let inventory = account.queue_client("inventory");
        orders.create_if_not_exists().await.unwrap();
        inventory.create_if_not_exists().await.unwrap();

        orders.send("order").await.unwrap();
        assert!(inventory.receive(LONG).await.unwrap().is_none());
        assert_eq!(inventory.approximate_count().await.unwrap(), 0);
        assert_eq!(orders.approximate_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_queue_is_not_found() {
        let (_dir, account) = temp_account().await;
        let queue = account.queue_client("ghosts");
        assert!(queue.send("boo").await.unwrap_err().is_not_found());
        assert!(queue.approximate_count().await.unwrap_err().is_not_found());
    }
}
