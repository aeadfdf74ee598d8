//! Durable FIFO queue of pending remote writes
//!
//! Rows are append-only: the queue supports append, an ordered full scan,
//! and delete-by-id. There is deliberately no update-in-place — a queued
//! operation is immutable until it is confirmed remotely and removed.

use async_trait::async_trait;
use libsql::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{NewSyncOperation, SyncOperation};

/// Trait for pending-operation storage
#[async_trait]
pub trait QueueRepository {
    /// Append an operation; returns the store-assigned identifier
    async fn append(&self, operation: &NewSyncOperation) -> Result<i64>;

    /// All pending operations, oldest first
    async fn pending(&self) -> Result<Vec<SyncOperation>>;

    /// Number of pending operations
    async fn depth(&self) -> Result<usize>;

    /// Delete an operation by its identifier
    async fn delete(&self, id: i64) -> Result<()>;
}

/// libSQL implementation of `QueueRepository`
pub struct LibSqlQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_operation(row: &libsql::Row) -> Result<SyncOperation> {
        let method: String = row.get(2)?;
        let payload_json: String = row.get(3)?;

        Ok(SyncOperation {
            id: row.get(0)?,
            endpoint: row.get(1)?,
            method: method.parse()?,
            payload: serde_json::from_str(&payload_json)?,
            created_at: row.get(4)?,
        })
    }
}

#[async_trait]
impl QueueRepository for LibSqlQueueRepository<'_> {
    async fn append(&self, operation: &NewSyncOperation) -> Result<i64> {
        let payload_json = serde_json::to_string(&operation.payload)?;

        self.conn
            .execute(
                "INSERT INTO sync_queue (endpoint, method, payload_json, created_at)
                 VALUES (?, ?, ?, ?)",
                params![
                    operation.endpoint.as_str(),
                    operation.method.as_str(),
                    payload_json,
                    operation.created_at
                ],
            )
            .await?;

        Ok(self.conn.last_insert_rowid())
    }

    async fn pending(&self) -> Result<Vec<SyncOperation>> {
        // Replay order: ascending enqueue time, insertion id as tiebreak
        let mut rows = self
            .conn
            .query(
                "SELECT id, endpoint, method, payload_json, created_at
                 FROM sync_queue
                 ORDER BY created_at ASC, id ASC",
                (),
            )
            .await?;

        let mut operations = Vec::new();
        while let Some(row) = rows.next().await? {
            operations.push(Self::parse_operation(&row)?);
        }

        Ok(operations)
    }

    async fn depth(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM sync_queue", ())
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };

        usize::try_from(count).map_err(|_| Error::Database("negative queue depth".to_string()))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_queue WHERE id = ?", params![id])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("queued operation {id}")));
        }

        Ok(())
    }
}
