use serde::{Deserialize, Serialize};
use std::fmt;

/// One physical target: a table object on one backend shard.
///
/// Created by table-rule resolution and never mutated afterwards. Two
/// nodes are comparable for cross-table work iff they live on the same
/// shard (same backend database instance).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectNode {
    pub shard_name: String,
    pub catalog: String,
    pub schema: String,
    pub object_name: String,
    /// Physical table suffix for partition-per-table layouts
    /// (e.g. `orders` → `orders_03`).
    pub suffix: Option<String>,
}

impl ObjectNode {
    pub fn new(
        shard_name: impl Into<String>,
        catalog: impl Into<String>,
        schema: impl Into<String>,
        object_name: impl Into<String>,
    ) -> Self {
        Self {
            shard_name: shard_name.into(),
            catalog: catalog.into(),
            schema: schema.into(),
            object_name: object_name.into(),
            suffix: None,
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// True when both nodes reference the same physical shard.
    pub fn same_shard(&self, other: &ObjectNode) -> bool {
        self.shard_name == other.shard_name
    }

    /// The physical object name, suffix applied.
    pub fn physical_name(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}_{}", self.object_name, suffix),
            None => self.object_name.clone(),
        }
    }
}

/// Renders `shard.catalog.schema.object[#suffix]`.
impl fmt::Display for ObjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.shard_name, self.catalog, self.schema, self.object_name
        )?;
        if let Some(suffix) = &self.suffix {
            write!(f, "#{suffix}")?;
        }
        Ok(())
    }
}
