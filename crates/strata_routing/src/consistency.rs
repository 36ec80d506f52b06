//! Cross-table node consistency.
//!
//! A join or foreign key can only be satisfied by a single per-node
//! worker when every node one table routes to has a same-shard
//! counterpart on the other. The checks here run at prepare time;
//! a statement that fails them must never dispatch a worker.

use strata_common::error::{ConsistencyError, StrataResult};
use strata_rule::{ObjectNode, TableRule};

/// True when the two rules' node sets are in shard-name bijection: same
/// cardinality, same multiset of shard names.
pub fn is_consistency_node(a: &TableRule, b: &TableRule) -> bool {
    let mut a_shards: Vec<&str> = a.nodes().iter().map(|n| n.shard_name.as_str()).collect();
    let mut b_shards: Vec<&str> = b.nodes().iter().map(|n| n.shard_name.as_str()).collect();
    if a_shards.len() != b_shards.len() {
        return false;
    }
    a_shards.sort_unstable();
    b_shards.sort_unstable();
    a_shards == b_shards
}

/// Raise the bijection check into a prepare-time statement error.
pub fn ensure_consistency(
    a_table: &str,
    a: &TableRule,
    b_table: &str,
    b: &TableRule,
) -> StrataResult<()> {
    if is_consistency_node(a, b) {
        Ok(())
    } else {
        Err(ConsistencyError::NodeSetMismatch {
            left: a_table.to_string(),
            right: b_table.to_string(),
        }
        .into())
    }
}

/// Find the node on `b` that lives on the same shard as `node_from_a`,
/// so a worker can carry both tables' locations in one context.
pub fn consistency_node<'b>(b: &'b TableRule, node_from_a: &ObjectNode) -> Option<&'b ObjectNode> {
    b.nodes().iter().find(|n| n.same_shard(node_from_a))
}

/// Structural join check for two sharded tables: beyond the node
/// bijection, every rule-column pair must be equality-constrained in the
/// join predicate (`join_pairs` as (left column, right column)). Anything
/// weaker cannot be guaranteed co-located and must broadcast instead.
pub fn is_join_colocated(a: &TableRule, b: &TableRule, join_pairs: &[(String, String)]) -> bool {
    if !is_consistency_node(a, b) {
        return false;
    }
    let (a_columns, b_columns) = match (a, b) {
        (TableRule::Sharded { .. }, TableRule::Sharded { .. }) => {
            (a.rule_columns(), b.rule_columns())
        }
        // A non-sharded side has no key to co-locate on; the bijection
        // alone decides.
        _ => return true,
    };
    if a_columns.len() != b_columns.len() {
        return false;
    }
    a_columns.iter().zip(b_columns).all(|(ac, bc)| {
        join_pairs
            .iter()
            .any(|(l, r)| (l == ac && r == bc) || (l == bc && r == ac))
    })
}

pub fn ensure_join_colocated(
    a_table: &str,
    a: &TableRule,
    b_table: &str,
    b: &TableRule,
    join_pairs: &[(String, String)],
) -> StrataResult<()> {
    if is_join_colocated(a, b, join_pairs) {
        Ok(())
    } else {
        Err(ConsistencyError::JoinNotColocated {
            left: a_table.to_string(),
            right: b_table.to_string(),
        }
        .into())
    }
}
