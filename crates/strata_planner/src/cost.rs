//! The structural cost model.
//!
//! Base cost scales with the node fan-out a full scan would pay; every
//! usable access path discounts it. The discounts are fixed fractions —
//! there are no live statistics behind them, only the structure of the
//! rule and the declared indexes.

use strata_common::error::{PlanError, StrataResult};
use strata_rule::{IndexDef, TableRule, TableSchema};

use crate::cache::PlanCache;
use crate::masks::PredicateMasks;
use crate::plan::{PlanItem, ScanningStrategy};

/// Cost of touching one node with a fully-keyed access.
pub const ROW_COST: f64 = 100.0;

const UNIQUE_KEY_FACTOR: f64 = 0.25;
const INDEX_PREFIX_FACTOR: f64 = 0.5;
const INDEX_RANGE_FACTOR: f64 = 0.75;

/// Select the cheapest safe access plan for `schema` under `masks`, then
/// gate it against the table's scan level.
pub fn best_plan_item(
    schema: &TableSchema,
    rule: &TableRule,
    masks: &PredicateMasks,
) -> StrataResult<PlanItem> {
    let plan = compute_plan(schema, rule, masks);
    gate(schema, rule, plan)
}

fn gate(schema: &TableSchema, rule: &TableRule, plan: PlanItem) -> StrataResult<PlanItem> {
    let level = rule.scan_level();
    if !plan.strategy.satisfies(level) {
        tracing::warn!(
            table = %schema.name,
            achieved = %plan.strategy,
            required = %level,
            "plan rejected by scan level"
        );
        return Err(PlanError::DisallowedScan {
            table: schema.name.clone(),
            achieved: plan.strategy.as_str(),
            required: level.as_str(),
        }
        .into());
    }
    Ok(plan)
}

/// Score the access paths and pick the best, ignoring the scan-level gate.
fn compute_plan(schema: &TableSchema, rule: &TableRule, masks: &PredicateMasks) -> PlanItem {
    let node_count = rule.nodes().len().max(1);
    let base_cost = match rule {
        TableRule::Sharded { .. } => ROW_COST * node_count as f64,
        _ => ROW_COST,
    };

    // Sharding-key equality over every rule column collapses routing to
    // at most one node; nothing beats it.
    let rule_columns = rule.rule_columns();
    if !rule_columns.is_empty() && rule_columns.iter().all(|c| masks.has_equality(c)) {
        let mut plan = PlanItem::new(ScanningStrategy::UseShardingKey, ROW_COST);
        plan.key_columns = rule_columns.to_vec();
        plan.table_filters = residual_filters(masks, &plan.key_columns);
        return plan;
    }

    // First declared index with a usable match wins.
    for index in &schema.indexes {
        if let Some(plan) = match_index(index, masks, base_cost) {
            let mut plan = plan;
            plan.table_filters = residual_filters(masks, &plan.key_columns);
            return plan;
        }
    }

    let mut plan = PlanItem::new(ScanningStrategy::FullScan, base_cost);
    plan.table_filters = residual_filters(masks, &[]);
    plan
}

fn match_index(index: &IndexDef, masks: &PredicateMasks, base_cost: f64) -> Option<PlanItem> {
    let mut eq_prefix = 0usize;
    for column in &index.columns {
        if masks.has_equality(column) {
            eq_prefix += 1;
        } else {
            break;
        }
    }

    if eq_prefix == index.columns.len() && index.unique {
        let mut plan = PlanItem::new(
            ScanningStrategy::UseUniqueKey,
            base_cost * UNIQUE_KEY_FACTOR,
        );
        plan.index = Some(index.name.clone());
        plan.key_columns = index.columns.clone();
        return Some(plan);
    }

    if eq_prefix > 0 {
        let mut plan = PlanItem::new(
            ScanningStrategy::UseIndexKey,
            base_cost * INDEX_PREFIX_FACTOR,
        );
        plan.index = Some(index.name.clone());
        plan.key_columns = index.columns[..eq_prefix].to_vec();
        return Some(plan);
    }

    // No equality prefix; a bounded comparison on the leading column
    // still beats a full scan.
    let first = index.columns.first()?;
    if masks.has_range(first) {
        let mut plan = PlanItem::new(
            ScanningStrategy::UseIndexKey,
            base_cost * INDEX_RANGE_FACTOR,
        );
        plan.index = Some(index.name.clone());
        plan.key_columns = vec![first.clone()];
        return Some(plan);
    }

    None
}

fn residual_filters(masks: &PredicateMasks, consumed: &[String]) -> Vec<String> {
    masks
        .constrained_columns()
        .filter(|column| !consumed.iter().any(|c| c == column))
        .map(str::to_string)
        .collect()
}

/// Planning facade with a per-table decision cache keyed by mask
/// fingerprint. Routing results are never cached (they depend on literal
/// values); plan decisions are (they depend only on masks).
pub struct Planner {
    cache: PlanCache,
}

impl Planner {
    pub fn new(config: &strata_common::PlannerConfig) -> Self {
        Self {
            cache: PlanCache::new(config),
        }
    }

    pub fn best_plan_item(
        &self,
        schema: &TableSchema,
        rule: &TableRule,
        masks: &PredicateMasks,
    ) -> StrataResult<PlanItem> {
        let fingerprint = masks.fingerprint();
        if let Some(plan) = self.cache.lookup(&schema.name, &fingerprint) {
            return gate(schema, rule, plan);
        }
        let plan = compute_plan(schema, rule, masks);
        self.cache.store(&schema.name, &fingerprint, &plan);
        gate(schema, rule, plan)
    }

    /// Drop cached decisions for a table (rule re-registration).
    pub fn invalidate(&self, table: &str) {
        self.cache.invalidate(table);
    }

    #[cfg(test)]
    pub(crate) fn cache_len(&self) -> usize {
        self.cache.len()
    }
}
