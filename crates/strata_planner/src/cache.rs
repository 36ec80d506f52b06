//! Plan-decision cache.
//!
//! Keyed by `(table, mask fingerprint)`. Only the decision (strategy,
//! cost, chosen index, consumed columns) is cached; `PlanItem`s handed to
//! callers are always freshly constructed, and routing results are never
//! cached at all.

use dashmap::DashMap;
use strata_common::PlannerConfig;

use crate::plan::{PlanItem, ScanningStrategy};

#[derive(Clone)]
struct CachedDecision {
    strategy: ScanningStrategy,
    cost: f64,
    index: Option<String>,
    key_columns: Vec<String>,
    table_filters: Vec<String>,
}

pub struct PlanCache {
    decisions: DashMap<(String, String), CachedDecision>,
    enabled: bool,
    capacity: usize,
}

impl PlanCache {
    pub fn new(config: &PlannerConfig) -> Self {
        Self {
            decisions: DashMap::new(),
            enabled: config.plan_cache_enabled,
            capacity: config.plan_cache_capacity,
        }
    }

    pub fn lookup(&self, table: &str, fingerprint: &str) -> Option<PlanItem> {
        if !self.enabled {
            return None;
        }
        let cached = self
            .decisions
            .get(&(table.to_string(), fingerprint.to_string()))?;
        let mut plan = PlanItem::new(cached.strategy, cached.cost);
        plan.index = cached.index.clone();
        plan.key_columns = cached.key_columns.clone();
        plan.table_filters = cached.table_filters.clone();
        Some(plan)
    }

    pub fn store(&self, table: &str, fingerprint: &str, plan: &PlanItem) {
        if !self.enabled {
            return;
        }
        if self.decisions.len() >= self.capacity {
            // Decisions are cheap to recompute; a full reset beats
            // tracking recency.
            tracing::debug!(capacity = self.capacity, "plan cache full, resetting");
            self.decisions.clear();
        }
        self.decisions.insert(
            (table.to_string(), fingerprint.to_string()),
            CachedDecision {
                strategy: plan.strategy,
                cost: plan.cost,
                index: plan.index.clone(),
                key_columns: plan.key_columns.clone(),
                table_filters: plan.table_filters.clone(),
            },
        );
    }

    pub fn invalidate(&self, table: &str) {
        self.decisions.retain(|(t, _), _| t != table);
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}
