//! End-to-end statement execution against an in-process mock backend:
//!
//! - fan-out and aggregation across shards (update counts, query cursors)
//! - prepare-phase gates: consistency, scan level, null sharding key —
//!   each must fail before a single worker touches the backend
//! - bulk-insert batching: flush sizes, aggregate counts, per-node
//!   failure isolation
//! - cancellation and connection ownership

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use strata_common::error::ExecError;
use strata_common::{CancelFlag, Datum, StrataConfig, TxnId};
use strata_executor::{
    ConnectionProvider, ExecutionFramework, Row, ShardConnection, StatementContext,
    StatementEffect, StatementTranslator, TableRef, TranslatedStatement,
};
use strata_planner::{PredicateMasks, MASK_EQ, MASK_GT};
use strata_routing::ColumnBounds;
use strata_rule::{
    HashBucketPartitioner, IndexDef, ObjectNode, ScanLevel, TableRegistry, TableRule,
    TableSchema,
};

// ── Mock backend ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Backend {
    /// Every statement that reached a shard, as (shard, sql).
    log: Mutex<Vec<(String, String)>>,
    fail_shards: Mutex<HashSet<String>>,
    opened: AtomicUsize,
}

impl Backend {
    fn executed(&self) -> Vec<(String, String)> {
        self.log.lock().clone()
    }

    fn executed_on(&self, shard: &str) -> usize {
        self.log.lock().iter().filter(|(s, _)| s == shard).count()
    }

    fn fail_shard(&self, shard: &str) {
        self.fail_shards.lock().insert(shard.to_string());
    }
}

struct BackendConnection {
    shard: String,
    backend: Arc<Backend>,
}

impl ShardConnection for BackendConnection {
    fn execute_update(
        &self,
        sql: &str,
        params: &[Datum],
        _deadline: Option<Duration>,
    ) -> Result<u64, ExecError> {
        if self.backend.fail_shards.lock().contains(&self.shard) {
            return Err(ExecError::Backend {
                shard: self.shard.clone(),
                message: "connection reset by peer".into(),
            });
        }
        self.backend
            .log
            .lock()
            .push((self.shard.clone(), sql.to_string()));
        // Bulk statements carry their row count as the first parameter.
        Ok(match params.first() {
            Some(Datum::Int64(n)) => *n as u64,
            _ => 1,
        })
    }

    fn execute_query(
        &self,
        sql: &str,
        _params: &[Datum],
        _deadline: Option<Duration>,
    ) -> Result<(Vec<String>, Vec<Row>), ExecError> {
        if self.backend.fail_shards.lock().contains(&self.shard) {
            return Err(ExecError::Backend {
                shard: self.shard.clone(),
                message: "connection reset by peer".into(),
            });
        }
        self.backend
            .log
            .lock()
            .push((self.shard.clone(), sql.to_string()));
        Ok((
            vec!["shard".into()],
            vec![vec![Datum::Text(self.shard.clone())]],
        ))
    }
}

struct BackendProvider(Arc<Backend>);

impl ConnectionProvider for BackendProvider {
    fn open(&self, shard_name: &str) -> Result<Arc<dyn ShardConnection>, ExecError> {
        self.0.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(BackendConnection {
            shard: shard_name.to_string(),
            backend: Arc::clone(&self.0),
        }))
    }
}

// ── Fixtures ───────────────────────────────────────────────────────────────

fn shard_nodes(table: &str, shards: &[&str]) -> Vec<ObjectNode> {
    shards
        .iter()
        .enumerate()
        .map(|(i, shard)| {
            ObjectNode::new(*shard, "cat", "db", table).with_suffix(format!("{i:02}"))
        })
        .collect()
}

fn sharded_rule(table: &str, shards: &[&str], scan_level: ScanLevel) -> TableRule {
    TableRule::Sharded {
        nodes: shard_nodes(table, shards),
        rule_columns: vec!["customer_id".into()],
        partitioner: Arc::new(
            HashBucketPartitioner::uniform(1, shards.len(), None).unwrap(),
        ),
        scan_level,
    }
}

fn orders_schema(name: &str) -> TableSchema {
    TableSchema::new(
        name,
        vec!["id".into(), "customer_id".into(), "amount".into()],
    )
    .with_index(IndexDef::new(format!("uq_{name}_id"), vec!["id".into()], true))
}

fn registry() -> Arc<TableRegistry> {
    let registry = TableRegistry::new();
    let shards = ["dn0", "dn1", "dn2", "dn3"];

    registry
        .register(
            orders_schema("orders"),
            sharded_rule("orders", &shards, ScanLevel::Unlimited),
        )
        .unwrap();
    registry
        .register(
            orders_schema("orders_strict"),
            sharded_rule("orders_strict", &shards, ScanLevel::ShardingKey),
        )
        .unwrap();
    registry
        .register(
            TableSchema::new("customers", vec!["id".into(), "customer_id".into()]),
            sharded_rule("customers", &shards, ScanLevel::Unlimited),
        )
        .unwrap();
    registry
        .register(
            TableSchema::new("remote_customers", vec!["id".into(), "customer_id".into()]),
            sharded_rule("remote_customers", &["dn8", "dn9"], ScanLevel::Unlimited),
        )
        .unwrap();
    registry
        .register(
            TableSchema::new("regions", vec!["code".into(), "name".into()]),
            TableRule::Global {
                metadata: ObjectNode::new("dn0", "cat", "db", "regions"),
                broadcasts: shard_nodes("regions", &shards),
            },
        )
        .unwrap();
    registry
        .register(
            TableSchema::new("events", vec!["id".into(), "customer_id".into()]),
            sharded_rule("events", &["dn0"], ScanLevel::Unlimited),
        )
        .unwrap();
    registry
        .register(
            TableSchema::new("events_wide", vec!["id".into(), "customer_id".into()]),
            sharded_rule("events_wide", &["dn0", "dn1"], ScanLevel::Unlimited),
        )
        .unwrap();

    Arc::new(registry)
}

fn harness() -> (ExecutionFramework, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let framework = ExecutionFramework::new(
        registry(),
        Arc::new(BackendProvider(Arc::clone(&backend))),
        &StrataConfig::default(),
    );
    (framework, backend)
}

fn dml_translator(verb: &'static str) -> impl StatementTranslator {
    move |node: &ObjectNode, rows: &[Row]| -> strata_common::StrataResult<TranslatedStatement> {
        let sql = format!("{verb} {}", node.physical_name());
        let mut stmt = TranslatedStatement::new(sql);
        if !rows.is_empty() {
            stmt = stmt.with_params(vec![Datum::Int64(rows.len() as i64)]);
        }
        Ok(stmt)
    }
}

// ── Fan-out and aggregation ────────────────────────────────────────────────

#[test]
fn test_unfiltered_update_fans_out_and_sums() {
    let (framework, backend) = harness();
    let translator = dml_translator("UPDATE");
    let ctx = StatementContext::new("orders", StatementEffect::Update, TxnId(1))
        .with_bounds(vec![ColumnBounds::none()]);

    let prepared = framework.prepare(&ctx, &translator).unwrap();
    assert_eq!(prepared.worker_count(), 4);

    let report = framework
        .execute_update(&prepared, &CancelFlag::new())
        .unwrap();
    assert_eq!(report.total_affected, 4);
    assert_eq!(report.per_node.len(), 4);
    assert_eq!(backend.executed().len(), 4);
}

#[test]
fn test_point_update_builds_one_worker() {
    let (framework, backend) = harness();
    let translator = dml_translator("UPDATE");
    let ctx = StatementContext::new("orders", StatementEffect::Update, TxnId(1))
        .with_bounds(vec![ColumnBounds::point(Datum::Int64(42))]);

    let prepared = framework.prepare(&ctx, &translator).unwrap();
    assert_eq!(prepared.worker_count(), 1);

    framework
        .execute_update(&prepared, &CancelFlag::new())
        .unwrap();
    assert_eq!(backend.executed().len(), 1);
}

#[test]
fn test_global_write_hits_every_broadcast_read_hits_one() {
    let (framework, _backend) = harness();
    let translator = dml_translator("DELETE");

    let write = StatementContext::new("regions", StatementEffect::Delete, TxnId(1));
    assert_eq!(framework.prepare(&write, &translator).unwrap().worker_count(), 4);

    let read = StatementContext::new("regions", StatementEffect::Query, TxnId(1));
    let prepared = framework.prepare(&read, &translator).unwrap();
    assert_eq!(prepared.worker_count(), 1);
    assert_eq!(prepared.workers()[0].node.shard_name, "dn0");
}

#[test]
fn test_query_exposes_one_cursor_per_node() {
    let (framework, _backend) = harness();
    let translator = dml_translator("SELECT");
    let ctx = StatementContext::new("orders", StatementEffect::Query, TxnId(1))
        .with_bounds(vec![ColumnBounds::none()]);

    let prepared = framework.prepare(&ctx, &translator).unwrap();
    let cursors = framework
        .execute_query(&prepared, &CancelFlag::new())
        .unwrap();
    assert_eq!(cursors.len(), 4);
    for cursor in &cursors {
        assert_eq!(cursor.columns, vec!["shard".to_string()]);
        assert_eq!(
            cursor.rows,
            vec![vec![Datum::Text(cursor.node.shard_name.clone())]]
        );
    }
}

#[test]
fn test_explain_reports_without_executing() {
    let (framework, backend) = harness();
    let translator = dml_translator("UPDATE");
    let ctx = StatementContext::new("orders", StatementEffect::Update, TxnId(1))
        .with_bounds(vec![ColumnBounds::none()]);

    let prepared = framework.prepare(&ctx, &translator).unwrap();
    let rows = framework.explain(&prepared);
    assert_eq!(rows.len(), 4);
    assert!(rows[0].sql.starts_with("UPDATE orders_"));
    assert!(backend.executed().is_empty());
}

#[test]
fn test_join_worker_carries_companion_node() {
    let (framework, _backend) = harness();
    let translator = dml_translator("SELECT");
    let ctx = StatementContext::new("orders", StatementEffect::Query, TxnId(1))
        .with_bounds(vec![ColumnBounds::point(Datum::Int64(7))])
        .with_reference(TableRef::join(
            "customers",
            vec![("customer_id".into(), "customer_id".into())],
        ));

    let prepared = framework.prepare(&ctx, &translator).unwrap();
    assert_eq!(prepared.worker_count(), 1);
    let worker = &prepared.workers()[0];
    assert_eq!(worker.companions.len(), 1);
    assert!(worker.companions[0].same_shard(&worker.node));
    assert_eq!(worker.companions[0].object_name, "customers");
}

// ── Prepare-phase gates ────────────────────────────────────────────────────

#[test]
fn test_consistency_gate_blocks_before_any_worker() {
    let (framework, backend) = harness();
    let translator = dml_translator("SELECT");
    let ctx = StatementContext::new("orders", StatementEffect::Query, TxnId(1))
        .with_bounds(vec![ColumnBounds::none()])
        .with_reference(TableRef::foreign_key("remote_customers"));

    let err = framework.prepare(&ctx, &translator).unwrap_err();
    assert_eq!(err.code(), "STR-NODE");
    assert!(err.is_prepare_failure());
    assert!(backend.executed().is_empty());
}

#[test]
fn test_scan_level_gate_blocks_before_any_worker() {
    let (framework, backend) = harness();
    let translator = dml_translator("SELECT");
    // Range on a non-key column: best achievable is a full scan, but the
    // table demands sharding-key routing.
    let ctx = StatementContext::new("orders_strict", StatementEffect::Query, TxnId(1))
        .with_bounds(vec![ColumnBounds::none()])
        .with_masks(PredicateMasks::new().with("amount", MASK_GT));

    let err = framework.prepare(&ctx, &translator).unwrap_err();
    assert_eq!(err.code(), "STR-SCAN");
    assert!(backend.executed().is_empty());
}

#[test]
fn test_scan_level_accepts_sharding_key_plan() {
    let (framework, _backend) = harness();
    let translator = dml_translator("SELECT");
    let ctx = StatementContext::new("orders_strict", StatementEffect::Query, TxnId(1))
        .with_bounds(vec![ColumnBounds::point(Datum::Int64(9))])
        .with_masks(PredicateMasks::new().with("customer_id", MASK_EQ));

    let prepared = framework.prepare(&ctx, &translator).unwrap();
    assert_eq!(prepared.worker_count(), 1);
    let plan = prepared.plan.as_ref().unwrap();
    assert_eq!(plan.strategy.rank(), 3);
}

#[test]
fn test_null_sharding_key_dispatches_zero_workers() {
    let (framework, backend) = harness();
    let translator = dml_translator("UPDATE");
    let ctx = StatementContext::new("orders", StatementEffect::Update, TxnId(1))
        .with_bounds(vec![ColumnBounds::point(Datum::Null)]);

    let err = framework.prepare(&ctx, &translator).unwrap_err();
    assert_eq!(err.code(), "STR-RULE");
    assert!(err.to_string().contains("customer_id"));
    assert!(backend.executed().is_empty());
}

// ── Failure and cancellation semantics ─────────────────────────────────────

#[test]
fn test_partial_failure_reports_failed_node_after_all_finish() {
    let (framework, backend) = harness();
    backend.fail_shard("dn2");
    let translator = dml_translator("UPDATE");
    let ctx = StatementContext::new("orders", StatementEffect::Update, TxnId(1))
        .with_bounds(vec![ColumnBounds::none()]);

    let prepared = framework.prepare(&ctx, &translator).unwrap();
    let err = framework
        .execute_update(&prepared, &CancelFlag::new())
        .unwrap_err();

    assert_eq!(err.code(), "STR-EXEC");
    assert!(err.to_string().contains("dn2"));
    // The three healthy shards were still given the chance to run; their
    // applied effects are not rolled back.
    assert_eq!(backend.executed().len(), 3);
    assert_eq!(backend.executed_on("dn2"), 0);
}

#[test]
fn test_cancellation_blocks_dispatch() {
    let (framework, backend) = harness();
    let translator = dml_translator("UPDATE");
    let ctx = StatementContext::new("orders", StatementEffect::Update, TxnId(1))
        .with_bounds(vec![ColumnBounds::none()]);

    let prepared = framework.prepare(&ctx, &translator).unwrap();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = framework.execute_update(&prepared, &cancel).unwrap_err();
    assert!(matches!(
        err,
        strata_common::StrataError::Exec(ExecError::Cancelled)
    ));
    assert!(backend.executed().is_empty());
}

#[test]
fn test_connections_are_reused_within_a_txn() {
    let (framework, backend) = harness();
    let translator = dml_translator("UPDATE");
    let ctx = StatementContext::new("orders", StatementEffect::Update, TxnId(7))
        .with_bounds(vec![ColumnBounds::none()]);

    let prepared = framework.prepare(&ctx, &translator).unwrap();
    framework
        .execute_update(&prepared, &CancelFlag::new())
        .unwrap();
    framework
        .execute_update(&prepared, &CancelFlag::new())
        .unwrap();

    // 4 shards, one connection each, reused across both executions.
    assert_eq!(backend.opened.load(Ordering::SeqCst), 4);
    framework.finish_txn(TxnId(7));
}

// ── Bulk-insert batching ───────────────────────────────────────────────────

#[test]
fn test_batch_flushes_at_threshold() -> anyhow::Result<()> {
    let (framework, backend) = harness();
    let translator = dml_translator("INSERT INTO");
    let cancel = CancelFlag::new();

    // 450 rows into a single-shard table with the default 200-row
    // threshold: exactly 200 + 200 + 50.
    let mut batch = framework.batch("events", vec![1], &translator, TxnId(1), &cancel)?;
    for i in 0..450i64 {
        batch.push(vec![Datum::Int64(i), Datum::Int64(i % 10)])?;
    }
    let report = batch.finish()?;

    assert_eq!(report.total_affected, 450);
    let sizes: Vec<usize> = report.flushes.iter().map(|f| f.rows).collect();
    assert_eq!(sizes, vec![200, 200, 50]);
    assert_eq!(backend.executed().len(), 3);
    Ok(())
}

#[test]
fn test_batch_classifies_rows_by_destination_node() -> anyhow::Result<()> {
    let (framework, backend) = harness();
    let translator = dml_translator("INSERT INTO");
    let cancel = CancelFlag::new();

    let mut batch = framework.batch("events_wide", vec![1], &translator, TxnId(1), &cancel)?;
    for i in 0..400i64 {
        batch.push(vec![Datum::Int64(i), Datum::Int64(i)])?;
    }
    let report = batch.finish()?;

    assert_eq!(report.total_affected, 400);
    // Both shards received at least one batch, and per-flush sizes never
    // exceed the threshold.
    assert!(backend.executed_on("dn0") >= 1);
    assert!(backend.executed_on("dn1") >= 1);
    assert!(report.flushes.iter().all(|f| f.rows <= 200));
    Ok(())
}

#[test]
fn test_batch_failure_leaves_other_nodes_flushes_applied() {
    let (framework, backend) = harness();
    backend.fail_shard("dn1");
    let translator = dml_translator("INSERT INTO");
    let cancel = CancelFlag::new();

    // Pre-compute keys per destination so the flush order is fixed:
    // dn0 flushes a full batch first, then dn1's flush fails.
    let binding = framework.registry().get("events_wide").unwrap();
    let partitioner = binding.rule.partitioner().unwrap();
    let keys_for = |node: usize| -> Vec<i64> {
        (0..)
            .filter(|&i| partitioner.partition_value(&Datum::Int64(i)).unwrap() == node)
            .take(200)
            .collect()
    };

    let mut batch = framework
        .batch("events_wide", vec![1], &translator, TxnId(1), &cancel)
        .unwrap();

    for key in keys_for(0) {
        batch.push(vec![Datum::Int64(key), Datum::Int64(key)]).unwrap();
    }
    assert_eq!(backend.executed_on("dn0"), 1);

    let mut err = None;
    for key in keys_for(1) {
        if let Err(e) = batch.push(vec![Datum::Int64(key), Datum::Int64(key)]) {
            err = Some(e);
            break;
        }
    }
    let err = err.expect("dn1's flush must fail");
    assert_eq!(err.code(), "STR-BATCH");
    assert!(err.to_string().contains("dn1"));
    // dn0's already-flushed batch stays applied.
    assert_eq!(backend.executed_on("dn0"), 1);
    assert_eq!(backend.executed_on("dn1"), 0);
}

#[test]
fn test_batch_null_key_fails_with_rule_error() {
    let (framework, backend) = harness();
    let translator = dml_translator("INSERT INTO");
    let cancel = CancelFlag::new();

    let mut batch = framework
        .batch("events", vec![1], &translator, TxnId(1), &cancel)
        .unwrap();
    let err = batch.push(vec![Datum::Int64(1), Datum::Null]).unwrap_err();
    assert_eq!(err.code(), "STR-RULE");
    assert!(backend.executed().is_empty());
}

#[test]
fn test_batch_checks_cancellation_at_flush_boundary() {
    let (framework, backend) = harness();
    let translator = dml_translator("INSERT INTO");
    let cancel = CancelFlag::new();

    let mut batch = framework
        .batch("events", vec![1], &translator, TxnId(1), &cancel)
        .unwrap();
    for i in 0..150i64 {
        batch.push(vec![Datum::Int64(i), Datum::Int64(i)]).unwrap();
    }
    cancel.cancel();
    let err = batch.push(vec![Datum::Int64(150), Datum::Int64(0)]).unwrap_err();
    assert!(matches!(
        err,
        strata_common::StrataError::Exec(ExecError::Cancelled)
    ));
    assert!(backend.executed().is_empty());
}
