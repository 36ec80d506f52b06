//! Partitioners: pure mappings from sharding-key value(s) to candidate
//! node indices.
//!
//! Implementations form a small closed set; anything beyond the built-in
//! hash-bucket scheme plugs in through [`PartitionerRegistry`] under an
//! explicit class name — rule configuration names the class, the registry
//! resolves it.

pub mod hash_bucket;
pub mod range;

use std::sync::Arc;

use dashmap::DashMap;
use strata_common::error::{RuleError, StrataResult};
use strata_common::Datum;

use self::hash_bucket::HashBucketPartitioner;

/// Capability interface over sharding-key evaluation.
///
/// All methods are pure: the same inputs produce the same node indices on
/// every call. Node indices are positions into the owning rule's node list.
pub trait Partitioner: Send + Sync {
    /// Class name this implementation is registered under.
    fn class_name(&self) -> &'static str;

    /// Number of key columns one evaluation consumes.
    fn arity(&self) -> usize;

    /// Number of physical nodes this partitioner maps onto.
    fn node_count(&self) -> usize;

    /// Node used for absent key values, when configured.
    fn default_node(&self) -> Option<usize>;

    /// Map a single-column key value to its node index.
    fn partition_value(&self, value: &Datum) -> Result<usize, RuleError>;

    /// Map a full composite key tuple (`values.len() == arity()`) to its
    /// node index.
    fn partition_tuple(&self, values: &[Datum]) -> Result<usize, RuleError>;

    /// Map a closed range `[begin, end]` to every node index it can reach.
    /// `max_span` bounds discrete enumeration; wider or non-enumerable
    /// ranges return every node (false positives are acceptable, false
    /// negatives are not).
    fn partition_range(
        &self,
        begin: &Datum,
        end: &Datum,
        max_span: u64,
    ) -> Result<Vec<usize>, RuleError>;

    /// Map many single-column key values to the union of their node
    /// indices, deduplicated in insertion order.
    fn partition_many(&self, values: &[Datum]) -> Result<Vec<usize>, RuleError> {
        let mut out = Vec::new();
        for value in values {
            let idx = self.partition_value(value)?;
            if !out.contains(&idx) {
                out.push(idx);
            }
        }
        Ok(out)
    }

    /// Every node index, in order. The conservative answer when no usable
    /// predicate exists.
    fn all_nodes(&self) -> Vec<usize> {
        (0..self.node_count()).collect()
    }
}

impl std::fmt::Debug for dyn Partitioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partitioner")
            .field("class_name", &self.class_name())
            .finish()
    }
}

/// Construction parameters a rule configuration hands to a partitioner
/// factory.
#[derive(Debug, Clone)]
pub struct PartitionerParams {
    pub arity: usize,
    pub node_count: usize,
    /// Virtual buckets owned by each node, in node order. `None` means an
    /// even split.
    pub bucket_lengths: Option<Vec<usize>>,
    pub default_node: Option<usize>,
}

type Factory = dyn Fn(&PartitionerParams) -> StrataResult<Arc<dyn Partitioner>> + Send + Sync;

/// Explicit class-name → factory registry. The built-in `hash-bucket`
/// class is pre-registered; custom partitioners are added by calling
/// [`register`](Self::register) before rules referencing them load.
pub struct PartitionerRegistry {
    factories: DashMap<String, Arc<Factory>>,
}

impl Default for PartitionerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionerRegistry {
    pub fn new() -> Self {
        let registry = Self {
            factories: DashMap::new(),
        };
        registry.register("hash-bucket", |params| {
            let partitioner = match &params.bucket_lengths {
                Some(lengths) => HashBucketPartitioner::from_bucket_lengths(
                    params.arity,
                    lengths,
                    params.default_node,
                )?,
                None => HashBucketPartitioner::uniform(
                    params.arity,
                    params.node_count,
                    params.default_node,
                )?,
            };
            Ok(Arc::new(partitioner) as Arc<dyn Partitioner>)
        });
        registry
    }

    pub fn register(
        &self,
        class: impl Into<String>,
        factory: impl Fn(&PartitionerParams) -> StrataResult<Arc<dyn Partitioner>>
            + Send
            + Sync
            + 'static,
    ) {
        self.factories.insert(class.into(), Arc::new(factory));
    }

    pub fn resolve(
        &self,
        class: &str,
        params: &PartitionerParams,
    ) -> StrataResult<Arc<dyn Partitioner>> {
        let factory = self
            .factories
            .get(class)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RuleError::UnknownPartitioner {
                class: class.to_string(),
            })?;
        factory(params)
    }
}
