//! Table rules: how one logical table maps to physical nodes.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_common::error::RuleError;

use crate::node::ObjectNode;
use crate::partition::Partitioner;
use crate::schema::TableSchema;

/// Minimum access strategy a sharded table accepts. A plan whose achieved
/// strategy is weaker than the configured level is rejected outright
/// rather than silently executed as a wider scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanLevel {
    /// Only sharding-key point routing is allowed.
    ShardingKey,
    /// Unique-index access or better.
    UniqueIndex,
    /// Any index access or better.
    AnyIndex,
    /// Full scans are acceptable.
    #[default]
    Unlimited,
}

impl ScanLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanLevel::ShardingKey => "sharding key",
            ScanLevel::UniqueIndex => "unique index",
            ScanLevel::AnyIndex => "any index",
            ScanLevel::Unlimited => "unlimited",
        }
    }
}

impl fmt::Display for ScanLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a logical table maps onto physical nodes. Closed over its three
/// variants; every consumer dispatches by pattern match.
#[derive(Clone)]
pub enum TableRule {
    /// One metadata node carries all reads and writes.
    Fixed { node: ObjectNode },

    /// One canonical metadata node plus broadcast replicas. Writes go to
    /// every broadcast; reads may use any single one. Replica consistency
    /// is the DDL executor's responsibility, not enforced here.
    Global {
        metadata: ObjectNode,
        broadcasts: Vec<ObjectNode>,
    },

    /// One node per shard, selected by a partitioner over the rule
    /// columns (the physical sharding key).
    Sharded {
        nodes: Vec<ObjectNode>,
        rule_columns: Vec<String>,
        partitioner: Arc<dyn Partitioner>,
        scan_level: ScanLevel,
    },
}

impl TableRule {
    /// The node set this rule can route to. For global tables this is the
    /// broadcast set (the write fan-out and the consistency surface).
    pub fn nodes(&self) -> &[ObjectNode] {
        match self {
            TableRule::Fixed { node } => std::slice::from_ref(node),
            TableRule::Global { broadcasts, .. } => broadcasts,
            TableRule::Sharded { nodes, .. } => nodes,
        }
    }

    /// The single canonical node, for table kinds that have one.
    pub fn metadata_node(&self) -> Option<&ObjectNode> {
        match self {
            TableRule::Fixed { node } => Some(node),
            TableRule::Global { metadata, .. } => Some(metadata),
            TableRule::Sharded { .. } => None,
        }
    }

    pub fn scan_level(&self) -> ScanLevel {
        match self {
            TableRule::Sharded { scan_level, .. } => *scan_level,
            _ => ScanLevel::Unlimited,
        }
    }

    pub fn rule_columns(&self) -> &[String] {
        match self {
            TableRule::Sharded { rule_columns, .. } => rule_columns,
            _ => &[],
        }
    }

    pub fn partitioner(&self) -> Option<&Arc<dyn Partitioner>> {
        match self {
            TableRule::Sharded { partitioner, .. } => Some(partitioner),
            _ => None,
        }
    }

    /// Node-type label surfaced through the `PARTITIONS` system view.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TableRule::Fixed { .. } => "fixed",
            TableRule::Global { .. } => "broadcast",
            TableRule::Sharded { .. } => "sharded",
        }
    }

    /// Validate this rule against the logical table it binds to. Runs at
    /// metadata load time; a failing rule is registered as uninitialized
    /// and every statement against the table fails until it is fixed.
    pub fn validate(&self, schema: &TableSchema) -> Result<(), RuleError> {
        match self {
            TableRule::Fixed { .. } => Ok(()),
            TableRule::Global { broadcasts, .. } => {
                if broadcasts.is_empty() {
                    return Err(RuleError::Uninitialized {
                        table: schema.name.clone(),
                    });
                }
                Ok(())
            }
            TableRule::Sharded {
                nodes,
                rule_columns,
                partitioner,
                ..
            } => {
                if nodes.is_empty() || rule_columns.is_empty() {
                    return Err(RuleError::Uninitialized {
                        table: schema.name.clone(),
                    });
                }
                if rule_columns.len() != partitioner.arity() {
                    return Err(RuleError::ArityMismatch {
                        table: schema.name.clone(),
                        declared: rule_columns.len(),
                        expected: partitioner.arity(),
                    });
                }
                if partitioner.node_count() != nodes.len() {
                    return Err(RuleError::NodeCountMismatch {
                        table: schema.name.clone(),
                        nodes: nodes.len(),
                        expected: partitioner.node_count(),
                    });
                }
                for column in rule_columns {
                    if !schema.has_column(column) {
                        return Err(RuleError::UnknownRuleColumn {
                            table: schema.name.clone(),
                            column: column.clone(),
                        });
                    }
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for TableRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRule::Fixed { node } => f.debug_struct("Fixed").field("node", node).finish(),
            TableRule::Global {
                metadata,
                broadcasts,
            } => f
                .debug_struct("Global")
                .field("metadata", metadata)
                .field("broadcasts", &broadcasts.len())
                .finish(),
            TableRule::Sharded {
                nodes,
                rule_columns,
                partitioner,
                scan_level,
            } => f
                .debug_struct("Sharded")
                .field("nodes", &nodes.len())
                .field("rule_columns", rule_columns)
                .field("partitioner", &partitioner.class_name())
                .field("scan_level", scan_level)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::hash_bucket::HashBucketPartitioner;

    fn shard_nodes(n: usize) -> Vec<ObjectNode> {
        (0..n)
            .map(|i| {
                ObjectNode::new(format!("dn{i}"), "cat", "db", "orders")
                    .with_suffix(format!("{i:02}"))
            })
            .collect()
    }

    fn sharded_rule(n: usize, rule_columns: Vec<String>, arity: usize) -> TableRule {
        TableRule::Sharded {
            nodes: shard_nodes(n),
            rule_columns,
            partitioner: Arc::new(HashBucketPartitioner::uniform(arity, n, None).unwrap()),
            scan_level: ScanLevel::Unlimited,
        }
    }

    fn orders_schema() -> TableSchema {
        TableSchema::new(
            "orders",
            vec!["id".into(), "customer_id".into(), "amount".into()],
        )
    }

    #[test]
    fn test_valid_sharded_rule() {
        let rule = sharded_rule(4, vec!["customer_id".into()], 1);
        assert!(rule.validate(&orders_schema()).is_ok());
        assert_eq!(rule.nodes().len(), 4);
        assert_eq!(rule.kind_name(), "sharded");
        assert!(rule.metadata_node().is_none());
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let rule = sharded_rule(4, vec!["customer_id".into(), "id".into()], 1);
        assert!(matches!(
            rule.validate(&orders_schema()),
            Err(RuleError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_rule_column_rejected() {
        let rule = sharded_rule(4, vec!["region".into()], 1);
        assert!(matches!(
            rule.validate(&orders_schema()),
            Err(RuleError::UnknownRuleColumn { .. })
        ));
    }

    #[test]
    fn test_node_count_mismatch_rejected() {
        let rule = TableRule::Sharded {
            nodes: shard_nodes(3),
            rule_columns: vec!["customer_id".into()],
            partitioner: Arc::new(HashBucketPartitioner::uniform(1, 4, None).unwrap()),
            scan_level: ScanLevel::Unlimited,
        };
        assert!(rule.validate(&orders_schema()).is_err());
    }

    #[test]
    fn test_fixed_and_global_accessors() {
        let meta = ObjectNode::new("dn0", "cat", "db", "settings");
        let fixed = TableRule::Fixed { node: meta.clone() };
        assert_eq!(fixed.nodes(), std::slice::from_ref(&meta));
        assert_eq!(fixed.scan_level(), ScanLevel::Unlimited);
        assert_eq!(fixed.kind_name(), "fixed");

        let global = TableRule::Global {
            metadata: meta.clone(),
            broadcasts: shard_nodes(3),
        };
        assert_eq!(global.nodes().len(), 3);
        assert_eq!(global.metadata_node(), Some(&meta));
        assert_eq!(global.kind_name(), "broadcast");
    }

    #[test]
    fn test_empty_global_is_uninitialized() {
        let global = TableRule::Global {
            metadata: ObjectNode::new("dn0", "cat", "db", "settings"),
            broadcasts: vec![],
        };
        assert!(matches!(
            global.validate(&orders_schema()),
            Err(RuleError::Uninitialized { .. })
        ));
    }
}
