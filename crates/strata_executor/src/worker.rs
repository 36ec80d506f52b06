//! One worker per target node, bound to one fully-rewritten statement.

use std::time::{Duration, Instant};

use strata_common::error::{ExecError, StrataResult};
use strata_rule::ObjectNode;

use crate::connection::ShardConnection;
use crate::translate::{Row, TranslatedStatement};

/// A unit of per-node work. Failures are wrapped with the node identity
/// and the SQL that was running, so a multi-node statement's error always
/// names its origin.
#[derive(Debug)]
pub struct Worker {
    pub node: ObjectNode,
    pub statement: TranslatedStatement,
    /// Same-shard nodes of referenced tables (FK targets, join partners)
    /// this worker's statement touches alongside its own node.
    pub companions: Vec<ObjectNode>,
    /// Payload rows bound to this worker (bulk paths).
    pub row_count: usize,
}

/// One shard's materialized query result, exposed to the caller as-is;
/// merging beyond concatenation is the result-merger's business.
#[derive(Debug, Clone)]
pub struct QueryCursor {
    pub node: ObjectNode,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub latency_us: u64,
}

impl Worker {
    pub fn new(node: ObjectNode, statement: TranslatedStatement) -> Self {
        Self {
            node,
            statement,
            companions: Vec::new(),
            row_count: 0,
        }
    }

    pub fn with_companions(mut self, companions: Vec<ObjectNode>) -> Self {
        self.companions = companions;
        self
    }

    pub fn with_row_count(mut self, rows: usize) -> Self {
        self.row_count = rows;
        self
    }

    pub fn execute_update(
        &self,
        conn: &dyn ShardConnection,
        deadline: Option<Duration>,
    ) -> StrataResult<u64> {
        conn.execute_update(&self.statement.sql, &self.statement.params, deadline)
            .map_err(|e| self.wrap(e))
    }

    pub fn execute_query(
        &self,
        conn: &dyn ShardConnection,
        deadline: Option<Duration>,
    ) -> StrataResult<QueryCursor> {
        let start = Instant::now();
        let (columns, rows) = conn
            .execute_query(&self.statement.sql, &self.statement.params, deadline)
            .map_err(|e| self.wrap(e))?;
        Ok(QueryCursor {
            node: self.node.clone(),
            columns,
            rows,
            latency_us: start.elapsed().as_micros() as u64,
        })
    }

    fn wrap(&self, e: ExecError) -> strata_common::StrataError {
        tracing::warn!(
            node = %self.node,
            error = %e,
            "worker failed"
        );
        ExecError::Worker {
            shard: self.node.shard_name.clone(),
            object: self.node.physical_name(),
            sql: self.statement.sql.clone(),
            cause: e.to_string(),
        }
        .into()
    }
}
