//! Route one statement to the nodes that must participate.

use strata_common::config::RoutingConfig;
use strata_common::error::{RuleError, StrataResult};
use strata_common::Datum;
use strata_rule::{ObjectNode, Partitioner, TableRule};

use crate::bounds::ColumnBounds;

/// The ordered, duplicate-free node set selected for one statement.
///
/// Built fresh on every invocation — routing depends on literal predicate
/// values, which differ per execution, so results are never cached.
#[derive(Debug, Clone, Default)]
pub struct RoutingResult {
    nodes: Vec<ObjectNode>,
}

impl RoutingResult {
    fn push(&mut self, node: &ObjectNode) {
        if !self.nodes.contains(node) {
            self.nodes.push(node.clone());
        }
    }

    fn from_indices(all: &[ObjectNode], indices: &[usize]) -> Self {
        let mut result = Self::default();
        for &idx in indices {
            if let Some(node) = all.get(idx) {
                result.push(node);
            }
        }
        result
    }

    pub fn nodes(&self) -> &[ObjectNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn into_nodes(self) -> Vec<ObjectNode> {
        self.nodes
    }
}

impl<'a> IntoIterator for &'a RoutingResult {
    type Item = &'a ObjectNode;
    type IntoIter = std::slice::Iter<'a, ObjectNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Route a read. Global tables read from one deterministic broadcast
/// (the first); everything else routes like a write.
pub fn route_read(
    table: &str,
    rule: &TableRule,
    bounds: &[ColumnBounds],
    config: &RoutingConfig,
) -> StrataResult<RoutingResult> {
    match rule {
        TableRule::Global { broadcasts, .. } => {
            let mut result = RoutingResult::default();
            // validate() guarantees at least one broadcast.
            if let Some(first) = broadcasts.first() {
                result.push(first);
            }
            Ok(result)
        }
        _ => route_write(table, rule, bounds, config),
    }
}

/// Route a write (insert/update/delete/DDL). Global tables fan out to
/// every broadcast replica to keep them in sync.
pub fn route_write(
    table: &str,
    rule: &TableRule,
    bounds: &[ColumnBounds],
    config: &RoutingConfig,
) -> StrataResult<RoutingResult> {
    match rule {
        TableRule::Fixed { node } => {
            let mut result = RoutingResult::default();
            result.push(node);
            Ok(result)
        }
        TableRule::Global { broadcasts, .. } => {
            let mut result = RoutingResult::default();
            for node in broadcasts {
                result.push(node);
            }
            Ok(result)
        }
        TableRule::Sharded {
            nodes,
            rule_columns,
            partitioner,
            ..
        } => {
            let indices =
                route_sharded(table, rule_columns, partitioner.as_ref(), bounds, config)?;
            let result = RoutingResult::from_indices(nodes, &indices);
            tracing::debug!(
                table = %table,
                selected = result.len(),
                total = nodes.len(),
                "sharded route computed"
            );
            Ok(result)
        }
    }
}

fn route_sharded(
    table: &str,
    rule_columns: &[String],
    partitioner: &dyn Partitioner,
    bounds: &[ColumnBounds],
    config: &RoutingConfig,
) -> StrataResult<Vec<usize>> {
    // An in-list on every rule column is the precise path.
    if bounds.len() == rule_columns.len() && bounds.iter().all(ColumnBounds::has_in_values) {
        if rule_columns.len() == 1 {
            let values = bounds[0].in_values.as_deref().unwrap_or(&[]);
            return partitioner
                .partition_many(values)
                .map_err(|e| null_key_context(e, table, &rule_columns[0]));
        }
        return route_composite(table, rule_columns, partitioner, bounds);
    }

    // Single-column rules can narrow by range.
    if rule_columns.len() == 1 && bounds.len() == 1 && bounds[0].has_range() {
        let start = bounds[0].start.clone().unwrap_or(Datum::Null);
        let end = bounds[0].end.clone().unwrap_or(Datum::Null);
        return partitioner
            .partition_range(&start, &end, config.range_enumeration_cap)
            .map_err(|e| null_key_context(e, table, &rule_columns[0]));
    }

    // No usable predicate: every shard node participates.
    Ok(partitioner.all_nodes())
}

/// Composite keys route by evaluating the partitioner over full value
/// tuples, position by position — a row's node is a function of the whole
/// key, never of its columns independently.
fn route_composite(
    table: &str,
    rule_columns: &[String],
    partitioner: &dyn Partitioner,
    bounds: &[ColumnBounds],
) -> StrataResult<Vec<usize>> {
    let lists: Vec<&[Datum]> = bounds
        .iter()
        .map(|b| b.in_values.as_deref().unwrap_or(&[]))
        .collect();
    let width = lists[0].len();
    if lists.iter().any(|list| list.len() != width) {
        // Unequal lists cannot be paired into key tuples; visiting every
        // node is correct, guessing pairings is not.
        tracing::debug!(table = %table, "composite in-lists unaligned, broadcasting");
        return Ok(partitioner.all_nodes());
    }

    let mut out = Vec::new();
    let mut tuple = Vec::with_capacity(rule_columns.len());
    for j in 0..width {
        tuple.clear();
        for list in &lists {
            tuple.push(list[j].clone());
        }
        let idx = partitioner
            .partition_tuple(&tuple)
            .map_err(|e| null_key_context(e, table, &rule_columns.join(",")))?;
        if !out.contains(&idx) {
            out.push(idx);
        }
    }
    Ok(out)
}

fn null_key_context(e: RuleError, table: &str, column: &str) -> strata_common::StrataError {
    match e {
        RuleError::NullKeyUnroutable => RuleError::NullShardingKey {
            table: table.to_string(),
            column: column.to_string(),
        }
        .into(),
        other => other.into(),
    }
}
