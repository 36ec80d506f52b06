//! Row batching for bulk insert and merge-from-query.
//!
//! Incoming rows are classified by destination node with the table's
//! partitioner, buffered per node, and flushed as one batched worker per
//! node when a buffer reaches the flush threshold or input ends. This
//! amortizes per-node round-trips while keeping memory bounded.
//!
//! A flush failure aborts that node's batch and the whole bulk statement;
//! batches already flushed to other nodes stay applied (no cross-shard
//! compensation).

use std::sync::Arc;

use serde::Serialize;
use strata_common::error::{BatchError, ExecError, RuleError, StrataResult};
use strata_common::{CancelFlag, Datum, TxnId};
use strata_rule::{TableBinding, TableRule};

use crate::framework::ExecutionFramework;
use crate::translate::{Row, StatementTranslator};
use crate::worker::Worker;

/// One completed flush: which node, how many rows.
#[derive(Debug, Clone, Serialize)]
pub struct FlushRecord {
    pub node: String,
    pub shard: String,
    pub rows: usize,
}

/// Outcome of a bulk dispatch: summed affected count plus the flush log.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total_affected: u64,
    pub flushes: Vec<FlushRecord>,
}

pub struct BatchDispatcher<'a> {
    framework: &'a ExecutionFramework,
    binding: Arc<TableBinding>,
    translator: &'a dyn StatementTranslator,
    txn: TxnId,
    cancel: &'a CancelFlag,
    /// Positions of the rule columns within each incoming row.
    key_indices: Vec<usize>,
    threshold: usize,
    buffers: Vec<Vec<Row>>,
    flushes: Vec<FlushRecord>,
    total_affected: u64,
}

impl<'a> BatchDispatcher<'a> {
    pub(crate) fn new(
        framework: &'a ExecutionFramework,
        binding: Arc<TableBinding>,
        key_indices: Vec<usize>,
        translator: &'a dyn StatementTranslator,
        txn: TxnId,
        cancel: &'a CancelFlag,
    ) -> StrataResult<Self> {
        if let TableRule::Sharded { rule_columns, .. } = &binding.rule {
            if key_indices.len() != rule_columns.len() {
                return Err(RuleError::WrongTupleWidth {
                    expected: rule_columns.len(),
                    got: key_indices.len(),
                }
                .into());
            }
        }
        let node_count = binding.rule.nodes().len();
        Ok(Self {
            framework,
            binding,
            translator,
            txn,
            cancel,
            key_indices,
            threshold: framework.config.batch_flush_rows,
            buffers: vec![Vec::new(); node_count],
            flushes: Vec::new(),
            total_affected: 0,
        })
    }

    /// Buffer one row, flushing any buffer that reaches the threshold.
    pub fn push(&mut self, row: Row) -> StrataResult<()> {
        if self.cancel.is_cancelled() {
            return Err(ExecError::Cancelled.into());
        }
        let targets = self.targets_for(&row)?;
        // Broadcast targets each take a copy; the common sharded case
        // moves the row into its single buffer.
        if let [single] = targets.as_slice() {
            self.buffers[*single].push(row);
        } else {
            for &idx in &targets {
                self.buffers[idx].push(row.clone());
            }
        }
        for idx in targets {
            if self.buffers[idx].len() >= self.threshold {
                self.flush_node(idx)?;
            }
        }
        Ok(())
    }

    /// Flush every remaining buffer and report the aggregate.
    pub fn finish(mut self) -> StrataResult<BatchReport> {
        for idx in 0..self.buffers.len() {
            self.flush_node(idx)?;
        }
        Ok(BatchReport {
            total_affected: self.total_affected,
            flushes: self.flushes,
        })
    }

    fn targets_for(&self, row: &Row) -> StrataResult<Vec<usize>> {
        match &self.binding.rule {
            TableRule::Sharded {
                rule_columns,
                partitioner,
                ..
            } => {
                let mut key = Vec::with_capacity(self.key_indices.len());
                for &idx in &self.key_indices {
                    key.push(row.get(idx).cloned().unwrap_or(Datum::Null));
                }
                let node = partitioner.partition_tuple(&key).map_err(|e| match e {
                    RuleError::NullKeyUnroutable => RuleError::NullShardingKey {
                        table: self.binding.schema.name.clone(),
                        column: rule_columns.join(","),
                    },
                    other => other,
                })?;
                Ok(vec![node])
            }
            TableRule::Fixed { .. } => Ok(vec![0]),
            // Broadcast tables replicate every row onto every node.
            TableRule::Global { .. } => Ok((0..self.binding.rule.nodes().len()).collect()),
        }
    }

    fn flush_node(&mut self, idx: usize) -> StrataResult<()> {
        if self.buffers[idx].is_empty() {
            return Ok(());
        }
        if self.cancel.is_cancelled() {
            return Err(ExecError::Cancelled.into());
        }
        let rows = std::mem::take(&mut self.buffers[idx]);
        let node = &self.binding.rule.nodes()[idx];

        let statement = self.translator.translate(node, &rows)?;
        let conn = self
            .framework
            .connections
            .get(self.txn, &node.shard_name)?;
        let worker = Worker::new(node.clone(), statement).with_row_count(rows.len());

        let affected = worker
            .execute_update(conn.as_ref(), self.framework.deadline())
            .map_err(|e| BatchError::FlushFailed {
                shard: node.shard_name.clone(),
                rows: rows.len(),
                cause: e.to_string(),
            })?;

        tracing::debug!(
            node = %node,
            rows = rows.len(),
            affected,
            "batch flushed"
        );
        self.total_affected += affected;
        self.flushes.push(FlushRecord {
            node: node.to_string(),
            shard: node.shard_name.clone(),
            rows: rows.len(),
        });
        Ok(())
    }
}
