use serde::{Deserialize, Serialize};
use std::fmt;

use strata_rule::ScanLevel;

/// Access-path classification, ordered by selectivity. Higher rank means
/// a narrower, cheaper access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanningStrategy {
    UseShardingKey,
    UseUniqueKey,
    UseIndexKey,
    FullScan,
}

impl ScanningStrategy {
    /// Selectivity rank: `UseShardingKey` (3) down to `FullScan` (0).
    pub fn rank(&self) -> u8 {
        match self {
            ScanningStrategy::UseShardingKey => 3,
            ScanningStrategy::UseUniqueKey => 2,
            ScanningStrategy::UseIndexKey => 1,
            ScanningStrategy::FullScan => 0,
        }
    }

    /// Whether this strategy meets a table's configured minimum level.
    pub fn satisfies(&self, level: ScanLevel) -> bool {
        let required = match level {
            ScanLevel::ShardingKey => 3,
            ScanLevel::UniqueIndex => 2,
            ScanLevel::AnyIndex => 1,
            ScanLevel::Unlimited => 0,
        };
        self.rank() >= required
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanningStrategy::UseShardingKey => "sharding key",
            ScanningStrategy::UseUniqueKey => "unique key",
            ScanningStrategy::UseIndexKey => "index key",
            ScanningStrategy::FullScan => "full scan",
        }
    }
}

impl fmt::Display for ScanningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scored access plan for one table. Built fresh per planning call
/// and consumed immediately; never shared or mutated across statements.
#[derive(Debug, Clone)]
pub struct PlanItem {
    pub cost: f64,
    pub strategy: ScanningStrategy,
    /// Index chosen when the strategy is index-backed.
    pub index: Option<String>,
    /// Columns consumed by the access path, in access order.
    pub key_columns: Vec<String>,
    /// Residual predicate columns the access path did not consume;
    /// applied as filters after the access.
    pub table_filters: Vec<String>,
    /// Plan for a table joined to this one, when the join is satisfied
    /// per node.
    pub join_plan: Option<Box<PlanItem>>,
    /// Plan for a nested (subquery) join.
    pub nested_join_plan: Option<Box<PlanItem>>,
}

impl PlanItem {
    pub fn new(strategy: ScanningStrategy, cost: f64) -> Self {
        Self {
            cost,
            strategy,
            index: None,
            key_columns: Vec::new(),
            table_filters: Vec::new(),
            join_plan: None,
            nested_join_plan: None,
        }
    }

    pub fn with_join(mut self, join: PlanItem) -> Self {
        self.join_plan = Some(Box::new(join));
        self
    }

    pub fn with_nested_join(mut self, nested: PlanItem) -> Self {
        self.nested_join_plan = Some(Box::new(nested));
        self
    }

    /// Total cost including attached join plans.
    pub fn total_cost(&self) -> f64 {
        self.cost
            + self.join_plan.as_deref().map_or(0.0, PlanItem::total_cost)
            + self
                .nested_join_plan
                .as_deref()
                .map_or(0.0, PlanItem::total_cost)
    }
}
