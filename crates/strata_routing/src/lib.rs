//! Statement routing: from a table rule and extracted predicate bounds to
//! the minimal correct set of physical nodes, plus the cross-table
//! consistency checks that gate single-worker joins and foreign keys.

pub mod bounds;
pub mod consistency;
pub mod route;

pub use bounds::ColumnBounds;
pub use consistency::{
    consistency_node, ensure_consistency, ensure_join_colocated, is_consistency_node,
    is_join_colocated,
};
pub use route::{route_read, route_write, RoutingResult};
