//! Per-statement execution: route, build one worker per target node,
//! fan out, aggregate.
//!
//! The framework owns no SQL knowledge and no wire protocol. It drives
//! two collaborators: a [`StatementTranslator`] that rewrites the
//! statement for each physical node, and a [`ConnectionProvider`] that
//! hands out the session's one connection per shard. Everything between
//! — routing, consistency gating, scoped-thread dispatch, first-error
//! aggregation, bulk-row batching — lives here.
//!
//! There is no cross-shard atomicity: when a multi-node statement fails
//! on one node after succeeding on others, the applied effects stay
//! applied. The statement as a whole is reported failed; compensation is
//! the caller's decision. This is a deliberate trade-off in the absence
//! of a two-phase commit coordinator.

pub mod batch;
pub mod connection;
pub mod framework;
pub mod translate;
pub mod worker;

pub use batch::{BatchDispatcher, BatchReport, FlushRecord};
pub use connection::{ConnectionProvider, SessionConnections, ShardConnection};
pub use framework::{
    ExecutionFramework, ExplainRow, NodeUpdate, PreparedStatement, StatementContext, TableRef,
    UpdateReport,
};
pub use translate::{Row, StatementEffect, StatementTranslator, TranslatedStatement};
pub use worker::{QueryCursor, Worker};
