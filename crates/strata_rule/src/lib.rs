//! Table rules and partitioning: how a logical table maps onto physical
//! shard nodes.
//!
//! The model, leaf first:
//!
//! - [`ObjectNode`] — one physical location (shard + catalog + schema +
//!   object), immutable.
//! - [`Partitioner`] — pure mapping from sharding-key value(s) to candidate
//!   node indices; the built-in implementation hashes into a fixed
//!   1024-slot virtual bucket space and resolves buckets to nodes through
//!   a static assignment table, so shard capacity can be non-uniform.
//! - [`TableRule`] — fixed (one node), global (broadcast replicas), or
//!   sharded (partitioner over rule columns, gated by a [`ScanLevel`]).
//! - [`TableRegistry`] — validated rule bindings by logical table name,
//!   surfaced read-only through the `PARTITIONS` system view.

pub mod node;
pub mod partition;
pub mod registry;
pub mod rule;
pub mod schema;
pub mod system_view;

pub use node::ObjectNode;
pub use partition::hash_bucket::{HashBucketPartitioner, VIRTUAL_BUCKETS};
pub use partition::range::enumerate_range;
pub use partition::{Partitioner, PartitionerParams, PartitionerRegistry};
pub use registry::{TableBinding, TableRegistry};
pub use rule::{ScanLevel, TableRule};
pub use schema::{IndexDef, TableSchema};
pub use system_view::{partitions_view, PartitionRow};
