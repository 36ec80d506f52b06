//! The per-statement execution framework.
//!
//! Lifecycle per statement effect: `prepare` (resolve rules, consistency
//! gates, plan gate, routing, worker construction) → `execute_update` /
//! `execute_query` → optional `explain`. Prepare-phase failures are
//! always fatal before any worker runs; execution-phase failures are
//! collected after every dispatched worker has finished, and the first
//! one (in worker order) becomes the statement's error.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use strata_common::error::{ConsistencyError, ErrorContext, ExecError, StrataResult};
use strata_common::{CancelFlag, ExecutorConfig, RoutingConfig, StrataConfig, TxnId};
use strata_planner::{PlanItem, Planner, PredicateMasks};
use strata_routing::{
    consistency_node, ensure_consistency, ensure_join_colocated, route_read, route_write,
    ColumnBounds,
};
use strata_rule::TableRegistry;

use crate::batch::BatchDispatcher;
use crate::connection::{ConnectionProvider, SessionConnections, ShardConnection};
use crate::translate::{StatementEffect, StatementTranslator};
use crate::worker::{QueryCursor, Worker};

/// A table referenced by the statement (FK target or join partner) that
/// must be node-consistent with the statement's table. With `join_pairs`
/// present the stronger co-location check applies.
#[derive(Debug, Clone)]
pub struct TableRef {
    pub table: String,
    pub join_pairs: Option<Vec<(String, String)>>,
}

impl TableRef {
    pub fn foreign_key(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            join_pairs: None,
        }
    }

    pub fn join(table: impl Into<String>, pairs: Vec<(String, String)>) -> Self {
        Self {
            table: table.into(),
            join_pairs: Some(pairs),
        }
    }
}

/// Everything the framework needs to prepare one statement. Produced by
/// the external parser/condition-extractor pipeline.
#[derive(Debug, Clone)]
pub struct StatementContext {
    pub table: String,
    pub effect: StatementEffect,
    /// Per rule-column bounds, positionally aligned with the rule columns.
    pub bounds: Vec<ColumnBounds>,
    /// Predicate masks; when present, the plan is validated against the
    /// table's scan level before any worker is built.
    pub masks: Option<PredicateMasks>,
    pub referenced: Vec<TableRef>,
    pub txn: TxnId,
}

impl StatementContext {
    pub fn new(table: impl Into<String>, effect: StatementEffect, txn: TxnId) -> Self {
        Self {
            table: table.into(),
            effect,
            bounds: Vec::new(),
            masks: None,
            referenced: Vec::new(),
            txn,
        }
    }

    pub fn with_bounds(mut self, bounds: Vec<ColumnBounds>) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_masks(mut self, masks: PredicateMasks) -> Self {
        self.masks = Some(masks);
        self
    }

    pub fn with_reference(mut self, reference: TableRef) -> Self {
        self.referenced.push(reference);
        self
    }
}

/// A routed statement with its workers built, ready to execute once.
#[derive(Debug)]
pub struct PreparedStatement {
    pub effect: StatementEffect,
    pub txn: TxnId,
    pub plan: Option<PlanItem>,
    workers: Vec<Worker>,
}

impl PreparedStatement {
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

/// Update aggregation: counts summed across all workers.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub total_affected: u64,
    pub per_node: Vec<NodeUpdate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeUpdate {
    pub node: String,
    pub shard: String,
    pub affected: u64,
}

/// One row of `explain` output: what would run where.
#[derive(Debug, Clone, Serialize)]
pub struct ExplainRow {
    pub node: String,
    pub shard: String,
    pub sql: String,
    pub param_count: usize,
}

pub struct ExecutionFramework {
    registry: Arc<TableRegistry>,
    planner: Planner,
    pub(crate) connections: SessionConnections,
    pub(crate) config: ExecutorConfig,
    pub(crate) routing: RoutingConfig,
}

impl ExecutionFramework {
    pub fn new(
        registry: Arc<TableRegistry>,
        provider: Arc<dyn ConnectionProvider>,
        config: &StrataConfig,
    ) -> Self {
        Self {
            registry,
            planner: Planner::new(&config.planner),
            connections: SessionConnections::new(provider),
            config: config.executor.clone(),
            routing: config.routing.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<TableRegistry> {
        &self.registry
    }

    /// Resolve rules, run consistency and plan gates, route, and build
    /// exactly one worker per selected node. Any failure here is a
    /// statement-level error raised before a single worker exists.
    pub fn prepare(
        &self,
        ctx: &StatementContext,
        translator: &dyn StatementTranslator,
    ) -> StrataResult<PreparedStatement> {
        let binding = self.registry.get(&ctx.table).ctx("stage=prepare")?;

        let mut referenced_bindings = Vec::with_capacity(ctx.referenced.len());
        for reference in &ctx.referenced {
            let rb = self.registry.get(&reference.table).ctx("stage=prepare")?;
            match &reference.join_pairs {
                Some(pairs) => ensure_join_colocated(
                    &ctx.table,
                    &binding.rule,
                    &reference.table,
                    &rb.rule,
                    pairs,
                )?,
                None => {
                    ensure_consistency(&ctx.table, &binding.rule, &reference.table, &rb.rule)?
                }
            }
            referenced_bindings.push(rb);
        }

        let plan = match &ctx.masks {
            Some(masks) => {
                Some(self.planner.best_plan_item(&binding.schema, &binding.rule, masks)?)
            }
            None => None,
        };

        let routed = if ctx.effect.is_write() {
            route_write(&ctx.table, &binding.rule, &ctx.bounds, &self.routing)?
        } else {
            route_read(&ctx.table, &binding.rule, &ctx.bounds, &self.routing)?
        };

        let mut workers = Vec::with_capacity(routed.len());
        for node in &routed {
            let statement = translator.translate(node, &[])?;
            let mut companions = Vec::with_capacity(referenced_bindings.len());
            for rb in &referenced_bindings {
                match consistency_node(&rb.rule, node) {
                    Some(companion) => companions.push(companion.clone()),
                    // The bijection check above makes this unreachable for
                    // well-formed rules; a concurrently re-registered rule
                    // must still fail loudly, not drop its companion.
                    None => {
                        return Err(ConsistencyError::NoCounterpartNode {
                            table: rb.schema.name.clone(),
                            shard: node.shard_name.clone(),
                        }
                        .into())
                    }
                }
            }
            workers.push(Worker::new(node.clone(), statement).with_companions(companions));
        }

        tracing::debug!(
            table = %ctx.table,
            effect = ?ctx.effect,
            workers = workers.len(),
            "statement prepared"
        );

        Ok(PreparedStatement {
            effect: ctx.effect,
            txn: ctx.txn,
            plan,
            workers,
        })
    }

    /// Run every worker and sum affected-row counts.
    pub fn execute_update(
        &self,
        prepared: &PreparedStatement,
        cancel: &CancelFlag,
    ) -> StrataResult<UpdateReport> {
        let deadline = self.deadline();
        let per_node = self.dispatch(prepared, cancel, |worker, conn| {
            let affected = worker.execute_update(conn, deadline)?;
            Ok(NodeUpdate {
                node: worker.node.to_string(),
                shard: worker.node.shard_name.clone(),
                affected,
            })
        })?;
        Ok(UpdateReport {
            total_affected: per_node.iter().map(|n| n.affected).sum(),
            per_node,
        })
    }

    /// Run every worker and expose the per-node cursors individually, in
    /// worker order. Merge/union is the result-merger collaborator's job.
    pub fn execute_query(
        &self,
        prepared: &PreparedStatement,
        cancel: &CancelFlag,
    ) -> StrataResult<Vec<QueryCursor>> {
        let deadline = self.deadline();
        self.dispatch(prepared, cancel, |worker, conn| {
            worker.execute_query(conn, deadline)
        })
    }

    /// Diagnostic: per-node SQL without executing anything.
    pub fn explain(&self, prepared: &PreparedStatement) -> Vec<ExplainRow> {
        prepared
            .workers
            .iter()
            .map(|worker| ExplainRow {
                node: worker.node.to_string(),
                shard: worker.node.shard_name.clone(),
                sql: worker.statement.sql.clone(),
                param_count: worker.statement.params.len(),
            })
            .collect()
    }

    /// Open a bulk-insert dispatcher that classifies rows by destination
    /// node and flushes node buffers at the configured threshold.
    pub fn batch<'a>(
        &'a self,
        table: &str,
        key_indices: Vec<usize>,
        translator: &'a dyn StatementTranslator,
        txn: TxnId,
        cancel: &'a CancelFlag,
    ) -> StrataResult<BatchDispatcher<'a>> {
        let binding = self.registry.get(table)?;
        BatchDispatcher::new(self, binding, key_indices, translator, txn, cancel)
    }

    /// Release the transaction's shard connections (commit/rollback).
    pub fn finish_txn(&self, txn: TxnId) {
        self.connections.release(txn);
    }

    pub(crate) fn deadline(&self) -> Option<Duration> {
        match self.config.statement_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Fan workers out and collect every result before reporting.
    ///
    /// A single worker runs inline on the calling thread. Larger sets run
    /// on scoped threads, at most `max_parallel_workers` at a time. No
    /// ordering exists across nodes; workers sharing a node run
    /// sequentially by construction (one worker per node per statement,
    /// one connection per shard per transaction).
    ///
    /// Every dispatched worker is given the chance to finish; the first
    /// error in worker order then decides the statement's outcome.
    /// Effects already applied on sibling nodes are not rolled back.
    fn dispatch<T, F>(
        &self,
        prepared: &PreparedStatement,
        cancel: &CancelFlag,
        run: F,
    ) -> StrataResult<Vec<T>>
    where
        T: Send,
        F: Fn(&Worker, &dyn ShardConnection) -> StrataResult<T> + Sync,
    {
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled.into());
        }

        let workers = &prepared.workers;
        let mut conns = Vec::with_capacity(workers.len());
        for worker in workers {
            conns.push(
                self.connections
                    .get(prepared.txn, &worker.node.shard_name)?,
            );
        }

        let mut results: Vec<StrataResult<T>> = Vec::with_capacity(workers.len());
        if workers.len() <= 1 {
            if let (Some(worker), Some(conn)) = (workers.first(), conns.first()) {
                results.push(run(worker, conn.as_ref()));
            }
        } else {
            let wave_size = self.config.max_parallel_workers.max(1);
            for (wave_workers, wave_conns) in
                workers.chunks(wave_size).zip(conns.chunks(wave_size))
            {
                if cancel.is_cancelled() {
                    results.push(Err(ExecError::Cancelled.into()));
                    break;
                }
                let wave: Vec<StrataResult<T>> = std::thread::scope(|s| {
                    let handles: Vec<_> = wave_workers
                        .iter()
                        .zip(wave_conns.iter())
                        .map(|(worker, conn)| {
                            let run = &run;
                            s.spawn(move || run(worker, conn.as_ref()))
                        })
                        .collect();
                    handles
                        .into_iter()
                        .zip(wave_workers.iter())
                        .map(|(handle, worker)| {
                            handle.join().unwrap_or_else(|_| {
                                Err(ExecError::WorkerPanic {
                                    shard: worker.node.shard_name.clone(),
                                }
                                .into())
                            })
                        })
                        .collect()
                });
                results.extend(wave);
            }
        }

        let mut values = Vec::with_capacity(results.len());
        let mut first_err = None;
        let mut failed = 0usize;
        for result in results {
            match result {
                Ok(value) => values.push(value),
                Err(e) => {
                    failed += 1;
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        if let Some(e) = first_err {
            // Effects already applied on the nodes that succeeded stay
            // applied; there is no cross-shard rollback.
            tracing::warn!(
                failed,
                succeeded = values.len(),
                error = %e,
                "statement failed on at least one node"
            );
            return Err(e);
        }
        Ok(values)
    }
}
