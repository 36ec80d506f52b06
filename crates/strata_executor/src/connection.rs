//! The connection/transaction collaborator boundary.
//!
//! Connection ownership is explicit: one connection per `(transaction,
//! shard)`, held in a map for the transaction's lifetime. Every worker
//! targeting that shard inside the transaction reuses it (single
//! connection semantics make same-node workers sequential); workers on
//! different shards never share one.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use strata_common::error::ExecError;
use strata_common::{Datum, TxnId};

use crate::translate::Row;

/// One live connection to a shard backend, scoped to the owning
/// session's active transaction.
///
/// Implementations report an expired `deadline` as
/// [`ExecError::DeadlineExceeded`]; providers report unreachable shards
/// as [`ExecError::NoConnection`].
pub trait ShardConnection: Send + Sync {
    /// Execute DML/DDL; returns the affected-row count.
    fn execute_update(
        &self,
        sql: &str,
        params: &[Datum],
        deadline: Option<Duration>,
    ) -> Result<u64, ExecError>;

    /// Execute a query; returns column names and materialized rows.
    fn execute_query(
        &self,
        sql: &str,
        params: &[Datum],
        deadline: Option<Duration>,
    ) -> Result<(Vec<String>, Vec<Row>), ExecError>;
}

/// Hands out shard connections. Pool/failover internals live behind this
/// boundary.
pub trait ConnectionProvider: Send + Sync {
    fn open(&self, shard_name: &str) -> Result<Arc<dyn ShardConnection>, ExecError>;
}

/// Session-scoped connection ownership, keyed by `(TxnId, shard name)`.
pub struct SessionConnections {
    provider: Arc<dyn ConnectionProvider>,
    by_txn_shard: DashMap<(TxnId, String), Arc<dyn ShardConnection>>,
}

impl SessionConnections {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            by_txn_shard: DashMap::new(),
        }
    }

    /// The transaction's connection to `shard`, opened on first use.
    pub fn get(
        &self,
        txn: TxnId,
        shard: &str,
    ) -> Result<Arc<dyn ShardConnection>, ExecError> {
        let key = (txn, shard.to_string());
        if let Some(existing) = self.by_txn_shard.get(&key) {
            return Ok(Arc::clone(existing.value()));
        }
        let opened = self.provider.open(shard)?;
        // A concurrent worker may have opened one first; keep the winner
        // so the transaction still sees a single connection per shard.
        let entry = self.by_txn_shard.entry(key).or_insert(opened);
        Ok(Arc::clone(entry.value()))
    }

    /// Drop every connection the transaction owns (commit/rollback).
    pub fn release(&self, txn: TxnId) {
        self.by_txn_shard.retain(|(t, _), _| *t != txn);
    }

    pub fn open_count(&self) -> usize {
        self.by_txn_shard.len()
    }
}
