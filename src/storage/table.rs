//! Table storage: schemaless entities addressed by (partition key, row key).

use super::{StorageAccount, StorageError, StorageResult, ensure_table_name};
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{FromRow, QueryBuilder, sqlite::Sqlite};
use tracing::debug;
use uuid::Uuid;

/// An entity that can be stored in a table.
///
/// Implementors carry their own keys; the store supplies the etag and the
/// last-write timestamp on every read and write.
pub trait TableEntity: Serialize + DeserializeOwned + Send + Sync {
    fn partition_key(&self) -> &str;
    fn row_key(&self) -> &str;
    fn set_system_properties(&mut self, etag: String, timestamp: DateTime<Utc>);
}

/// Write precondition for [`TableClient::update_entity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCondition {
    /// Replace whatever is stored (last writer wins).
    Unconditional,
    /// Replace only if the stored etag still matches.
    IfMatch(String),
}

/// Exact-match filter on a single entity property.
#[derive(Debug, Clone, Copy)]
pub struct PropertyFilter<'a> {
    pub property: &'a str,
    pub value: &'a str,
}

#[derive(FromRow)]
struct EntityRow {
    etag: String,
    timestamp: DateTime<Utc>,
    properties: String,
}

impl EntityRow {
    fn into_entity<E: TableEntity>(self) -> StorageResult<E> {
        let mut entity: E = serde_json::from_str(&self.properties)?;
        entity.set_system_properties(self.etag, self.timestamp);
        Ok(entity)
    }
}

#[derive(Clone)]
pub struct TableClient {
    account: StorageAccount,
    name: String,
}

impl TableClient {
    pub(crate) fn new(account: StorageAccount, name: &str) -> Self {
        Self {
            account,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register the table. Returns `true` when it did not exist before.
    pub async fn create_if_not_exists(&self) -> StorageResult<bool> {
        ensure_table_name(&self.name)?;
        let result =
            sqlx::query("INSERT OR IGNORE INTO storage_tables (name, created_at) VALUES (?, ?)")
                .bind(&self.name)
                .bind(Utc::now())
                .execute(self.account.db()?)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn exists(&self) -> StorageResult<bool> {
        let found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM storage_tables WHERE name = ?")
            .bind(&self.name)
            .fetch_one(self.account.db()?)
            .await?;
        Ok(found > 0)
    }

    async fn ensure_exists(&self) -> StorageResult<()> {
        if self.exists().await? {
            Ok(())
        } else {
            Err(StorageError::not_found("table", &self.name))
        }
    }

    fn entity_name(partition_key: &str, row_key: &str) -> String {
        format!("{partition_key}/{row_key}")
    }

    /// Insert a new entity. Fails with `AlreadyExists` when the keys are taken.
    pub async fn add_entity<E: TableEntity>(&self, entity: &E) -> StorageResult<E> {
        self.ensure_exists().await?;
        let properties = serde_json::to_string(entity)?;
        let etag = new_etag();
        let timestamp = Utc::now();

        let inserted = sqlx::query(
            "INSERT INTO entities (table_name, partition_key, row_key, etag, timestamp, properties)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.name)
        .bind(entity.partition_key())
        .bind(entity.row_key())
        .bind(&etag)
        .bind(timestamp)
        .bind(&properties)
        .execute(self.account.db()?)
        .await;

        match inserted {
            Ok(_) => {
                debug!(table = %self.name, row_key = entity.row_key(), "inserted entity");
                let mut stored: E = serde_json::from_str(&properties)?;
                stored.set_system_properties(etag, timestamp);
                Ok(stored)
            }
            Err(err) if is_unique_violation(&err) => Err(StorageError::AlreadyExists {
                kind: "entity",
                name: Self::entity_name(entity.partition_key(), entity.row_key()),
            }),
            Err(err) => Err(StorageError::Sqlx(err)),
        }
    }

    pub async fn get_entity<E: TableEntity>(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> StorageResult<E> {
        self.ensure_exists().await?;
        sqlx::query_as::<_, EntityRow>(
            "SELECT etag, timestamp, properties FROM entities
             WHERE table_name = ? AND partition_key = ? AND row_key = ?",
        )
        .bind(&self.name)
        .bind(partition_key)
        .bind(row_key)
        .fetch_optional(self.account.db()?)
        .await?
        .ok_or_else(|| StorageError::not_found("entity", Self::entity_name(partition_key, row_key)))?
        .into_entity()
    }

    /// Every entity in `partition_key`, ordered by row key, optionally
    /// narrowed by an exact, case-sensitive property match.
    pub async fn query_entities<E: TableEntity>(
        &self,
        partition_key: &str,
        filter: Option<PropertyFilter<'_>>,
    ) -> StorageResult<Vec<E>> {
        self.ensure_exists().await?;

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT etag, timestamp, properties FROM entities WHERE table_name = ",
        );
        builder.push_bind(&self.name);
        builder.push(" AND partition_key = ");
        builder.push_bind(partition_key);

        if let Some(filter) = filter {
            builder.push(" AND json_extract(properties, ");
            builder.push_bind(format!("$.{}", filter.property));
            builder.push(") = ");
            builder.push_bind(filter.value);
        }

        builder.push(" ORDER BY row_key ASC");

        let rows: Vec<EntityRow> = builder.build_query_as().fetch_all(self.account.db()?).await?;
        rows.into_iter().map(EntityRow::into_entity).collect()
    }

    /// Replace a stored entity. Fails with `NotFound` when the keys are not
    /// stored and with `Conflict` when an `IfMatch` etag is stale.
    pub async fn update_entity<E: TableEntity>(
        &self,
        entity: &E,
        condition: UpdateCondition,
    ) -> StorageResult<E> {
        self.ensure_exists().await?;
        let properties = serde_json::to_string(entity)?;
        let etag = new_etag();
        let timestamp = Utc::now();

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE entities SET properties = ");
        builder.push_bind(&properties);
        builder.push(", etag = ");
        builder.push_bind(&etag);
        builder.push(", timestamp = ");
        builder.push_bind(timestamp);
        builder.push(" WHERE table_name = ");
        builder.push_bind(&self.name);
        builder.push(" AND partition_key = ");
        builder.push_bind(entity.partition_key());
        builder.push(" AND row_key = ");
        builder.push_bind(entity.row_key());
        if let UpdateCondition::IfMatch(expected) = &condition {
            builder.push(" AND etag = ");
            builder.push_bind(expected);
        }

        let result = builder.build().execute(self.account.db()?).await?;
        if result.rows_affected() == 0 {
            let name = Self::entity_name(entity.partition_key(), entity.row_key());
            let stored = self
                .entity_exists(entity.partition_key(), entity.row_key())
                .await?;
            return Err(if stored {
                StorageError::Conflict {
                    kind: "entity",
                    name,
                }
            } else {
                StorageError::not_found("entity", name)
            });
        }

        debug!(table = %self.name, row_key = entity.row_key(), "replaced entity");
        let mut stored: E = serde_json::from_str(&properties)?;
        stored.set_system_properties(etag, timestamp);
        Ok(stored)
    }

    async fn entity_exists(&self, partition_key: &str, row_key: &str) -> StorageResult<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM entities
             WHERE table_name = ? AND partition_key = ? AND row_key = ?",
        )
        .bind(&self.name)
        .bind(partition_key)
        .bind(row_key)
        .fetch_one(self.account.db()?)
        .await?;
        Ok(found > 0)
    }

    pub async fn delete_entity(&self, partition_key: &str, row_key: &str) -> StorageResult<()> {
        self.ensure_exists().await?;
        let result = sqlx::query(
            "DELETE FROM entities WHERE table_name = ? AND partition_key = ? AND row_key = ?",
        )
        .bind(&self.name)
        .bind(partition_key)
        .bind(row_key)
        .execute(self.account.db()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(
                "entity",
                Self::entity_name(partition_key, row_key),
            ));
        }
        Ok(())
    }
}

fn new_etag() -> String {
    format!("W/\"{}\"", Uuid::new_v4().simple())
}

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
