//! Hash-bucket partitioning.
//!
//! A key value is reduced to its canonical byte encoding, hashed with
//! xxHash3-64, and mapped into a fixed 1024-slot virtual bucket space.
//! A static bucket→node assignment table, built from configured per-node
//! bucket lengths, resolves the virtual bucket to a physical node index.
//!
//! The two-level indirection lets shards own unequal bucket counts
//! (non-uniform capacity) without rehashing when bucket lengths change;
//! changing the *node count* still requires redistribution.

use strata_common::error::{ConfigError, RuleError};
use strata_common::Datum;
use xxhash_rust::xxh3::xxh3_64;

use super::range::enumerate_range;
use super::Partitioner;

/// Size of the virtual bucket space. Fixed: bucket→node tables are built
/// against it and persisted in rule configuration.
pub const VIRTUAL_BUCKETS: usize = 1024;

#[derive(Debug)]
pub struct HashBucketPartitioner {
    arity: usize,
    node_count: usize,
    default_node: Option<usize>,
    /// `bucket_to_node[b]` = node index owning virtual bucket `b`.
    bucket_to_node: Vec<u16>,
}

impl HashBucketPartitioner {
    /// Build from explicit per-node bucket lengths. Lengths are laid out
    /// sequentially over the bucket space and must sum to exactly
    /// [`VIRTUAL_BUCKETS`].
    pub fn from_bucket_lengths(
        arity: usize,
        lengths: &[usize],
        default_node: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let table = Self::build_table(lengths)?;
        Self::checked(arity, lengths.len(), default_node, table)
    }

    /// Even split of the bucket space across `node_count` nodes, the
    /// remainder absorbed by the last node.
    pub fn uniform(
        arity: usize,
        node_count: usize,
        default_node: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if node_count == 0 {
            return Err(ConfigError::BucketTable {
                reason: "node count must be at least 1".into(),
            });
        }
        let base = VIRTUAL_BUCKETS / node_count;
        let mut lengths = vec![base; node_count];
        lengths[node_count - 1] += VIRTUAL_BUCKETS - base * node_count;
        let table = Self::build_table(&lengths)?;
        Self::checked(arity, node_count, default_node, table)
    }

    fn checked(
        arity: usize,
        node_count: usize,
        default_node: Option<usize>,
        bucket_to_node: Vec<u16>,
    ) -> Result<Self, ConfigError> {
        if arity == 0 {
            return Err(ConfigError::BucketTable {
                reason: "partitioner arity must be at least 1".into(),
            });
        }
        if let Some(default) = default_node {
            if default >= node_count {
                return Err(ConfigError::BucketTable {
                    reason: format!(
                        "default node {default} out of range for {node_count} node(s)"
                    ),
                });
            }
        }
        Ok(Self {
            arity,
            node_count,
            default_node,
            bucket_to_node,
        })
    }

    fn build_table(lengths: &[usize]) -> Result<Vec<u16>, ConfigError> {
        if lengths.is_empty() {
            return Err(ConfigError::BucketTable {
                reason: "no nodes configured".into(),
            });
        }
        let total: usize = lengths.iter().sum();
        if total != VIRTUAL_BUCKETS {
            return Err(ConfigError::BucketTable {
                reason: format!(
                    "bucket lengths sum to {total}, expected {VIRTUAL_BUCKETS}"
                ),
            });
        }
        if let Some(node) = lengths.iter().position(|&len| len == 0) {
            return Err(ConfigError::BucketTable {
                reason: format!("node {node} owns zero buckets"),
            });
        }
        let mut table = Vec::with_capacity(VIRTUAL_BUCKETS);
        for (node, &len) in lengths.iter().enumerate() {
            table.extend(std::iter::repeat(node as u16).take(len));
        }
        Ok(table)
    }

    fn node_of_bytes(&self, bytes: &[u8]) -> usize {
        let bucket = (xxh3_64(bytes) % VIRTUAL_BUCKETS as u64) as usize;
        self.bucket_to_node[bucket] as usize
    }
}

impl Partitioner for HashBucketPartitioner {
    fn class_name(&self) -> &'static str {
        "hash-bucket"
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn node_count(&self) -> usize {
        self.node_count
    }

    fn default_node(&self) -> Option<usize> {
        self.default_node
    }

    fn partition_value(&self, value: &Datum) -> Result<usize, RuleError> {
        self.partition_tuple(std::slice::from_ref(value))
    }

    fn partition_tuple(&self, values: &[Datum]) -> Result<usize, RuleError> {
        if values.len() != self.arity {
            return Err(RuleError::WrongTupleWidth {
                expected: self.arity,
                got: values.len(),
            });
        }
        if values.iter().any(Datum::is_null) {
            return self.default_node.ok_or(RuleError::NullKeyUnroutable);
        }
        let mut buf = Vec::with_capacity(values.len() * 8);
        for value in values {
            value.encode_for_hash(&mut buf);
        }
        Ok(self.node_of_bytes(&buf))
    }

    fn partition_range(
        &self,
        begin: &Datum,
        end: &Datum,
        max_span: u64,
    ) -> Result<Vec<usize>, RuleError> {
        match enumerate_range(begin, end, max_span) {
            Some(values) => {
                let mut out = Vec::new();
                for value in &values {
                    let idx = self.partition_value(value)?;
                    if !out.contains(&idx) {
                        out.push(idx);
                    }
                }
                Ok(out)
            }
            None => {
                tracing::debug!(
                    begin = %begin,
                    end = %end,
                    "range not enumerable, broadcasting to all {} node(s)",
                    self.node_count
                );
                Ok(self.all_nodes())
            }
        }
    }
}
