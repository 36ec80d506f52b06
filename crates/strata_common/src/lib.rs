//! Shared foundation for the Strata sharding core: the interface value type
//! exchanged with the external expression evaluator, identifier newtypes,
//! the error taxonomy, configuration, and the session cancellation flag.

pub mod cancel;
pub mod config;
pub mod datum;
pub mod error;
pub mod types;

pub use cancel::CancelFlag;
pub use config::{ExecutorConfig, PlannerConfig, RoutingConfig, StrataConfig};
pub use datum::Datum;
pub use error::{
    BatchError, ConfigError, ConsistencyError, ErrorContext, ErrorKind, ExecError, PlanError,
    RuleError, StrataError, StrataResult,
};
pub use types::{SessionId, TxnId};
