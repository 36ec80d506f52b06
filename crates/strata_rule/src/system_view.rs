//! Read-only `PARTITIONS` system view: one row per (logical table ×
//! physical node), projected straight from the table registry.

use serde::Serialize;

use crate::registry::TableRegistry;

/// One `PARTITIONS` row.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionRow {
    pub catalog: String,
    pub schema: String,
    pub object_name: String,
    /// Shard (backend instance) the node lives on.
    pub data_node: String,
    /// Physical object name on that shard, suffix applied.
    pub node_name: String,
    /// `fixed`, `broadcast`, or `sharded`.
    pub node_type: &'static str,
    pub partitioner_class: Option<String>,
}

/// Project the registry into `PARTITIONS` rows, ordered by
/// (object_name, data_node).
pub fn partitions_view(registry: &TableRegistry) -> Vec<PartitionRow> {
    let mut rows = Vec::new();
    for binding in registry.bindings() {
        let rule = &binding.rule;
        let partitioner_class = rule
            .partitioner()
            .map(|p| p.class_name().to_string());
        for node in rule.nodes() {
            rows.push(PartitionRow {
                catalog: node.catalog.clone(),
                schema: node.schema.clone(),
                object_name: node.object_name.clone(),
                data_node: node.shard_name.clone(),
                node_name: node.physical_name(),
                node_type: rule.kind_name(),
                partitioner_class: partitioner_class.clone(),
            });
        }
    }
    rows.sort_by(|a, b| {
        a.object_name
            .cmp(&b.object_name)
            .then_with(|| a.data_node.cmp(&b.data_node))
    });
    rows
}
