//! The SQL-translator collaborator boundary.
//!
//! The core never sees the backend dialect. A translator instance is
//! built by the caller around one parsed statement; the framework asks it
//! for node-local SQL once per target node (plus the row payload bound to
//! that node, for bulk paths).

use serde::{Deserialize, Serialize};
use strata_common::error::StrataResult;
use strata_common::Datum;
use strata_rule::ObjectNode;

/// One full row of values, in the logical table's column order.
pub type Row = Vec<Datum>;

/// What a statement does to its table; decides write vs read routing and
/// how results aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementEffect {
    Insert,
    Update,
    Delete,
    Ddl,
    Query,
}

impl StatementEffect {
    pub fn is_write(&self) -> bool {
        !matches!(self, StatementEffect::Query)
    }
}

/// Node-local SQL text plus parameter bindings, ready to execute.
#[derive(Debug, Clone)]
pub struct TranslatedStatement {
    pub sql: String,
    pub params: Vec<Datum>,
}

impl TranslatedStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<Datum>) -> Self {
        self.params = params;
        self
    }
}

/// Rewrites one statement for one physical node. `rows` is the payload
/// classified to that node (empty for everything but bulk inserts).
pub trait StatementTranslator: Send + Sync {
    fn translate(&self, node: &ObjectNode, rows: &[Row]) -> StrataResult<TranslatedStatement>;
}

impl<F> StatementTranslator for F
where
    F: Fn(&ObjectNode, &[Row]) -> StrataResult<TranslatedStatement> + Send + Sync,
{
    fn translate(&self, node: &ObjectNode, rows: &[Row]) -> StrataResult<TranslatedStatement> {
        self(node, rows)
    }
}
