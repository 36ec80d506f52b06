//! Validated table-rule bindings, by logical table name.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use strata_common::error::{RuleError, StrataResult};

use crate::rule::TableRule;
use crate::schema::TableSchema;

/// One logical table bound to its validated rule.
#[derive(Debug)]
pub struct TableBinding {
    pub schema: TableSchema,
    pub rule: TableRule,
}

enum BindingState {
    Ready(Arc<TableBinding>),
    /// Validation failed at load time; statements against the table fail
    /// until the rule is fixed and re-registered.
    Invalid(String),
}

/// Registry of table rules. Rules are validated on registration; an
/// invalid rule is remembered as uninitialized rather than dropped, so
/// lookups report a rule error instead of "unknown table".
#[derive(Default)]
pub struct TableRegistry {
    tables: RwLock<HashMap<String, BindingState>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a rule. Replaces any previous binding for the
    /// table, valid or not.
    pub fn register(&self, schema: TableSchema, rule: TableRule) -> StrataResult<()> {
        let table = schema.name.clone();
        match rule.validate(&schema) {
            Ok(()) => {
                tracing::debug!(table = %table, kind = rule.kind_name(), "table rule registered");
                self.tables.write().insert(
                    table,
                    BindingState::Ready(Arc::new(TableBinding { schema, rule })),
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "table rule rejected at load");
                let message = e.to_string();
                self.tables.write().insert(table, BindingState::Invalid(message));
                Err(e.into())
            }
        }
    }

    pub fn get(&self, table: &str) -> StrataResult<Arc<TableBinding>> {
        match self.tables.read().get(table) {
            Some(BindingState::Ready(binding)) => Ok(Arc::clone(binding)),
            Some(BindingState::Invalid(_)) => Err(RuleError::Uninitialized {
                table: table.to_string(),
            }
            .into()),
            None => Err(RuleError::Unknown {
                table: table.to_string(),
            }
            .into()),
        }
    }

    /// Every valid binding, sorted by table name (the `PARTITIONS` view
    /// iterates this).
    pub fn bindings(&self) -> Vec<Arc<TableBinding>> {
        let tables = self.tables.read();
        let mut out: Vec<Arc<TableBinding>> = tables
            .values()
            .filter_map(|state| match state {
                BindingState::Ready(binding) => Some(Arc::clone(binding)),
                BindingState::Invalid(_) => None,
            })
            .collect();
        out.sort_by(|a, b| a.schema.name.cmp(&b.schema.name));
        out
    }
}
