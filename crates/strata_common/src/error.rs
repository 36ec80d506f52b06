use thiserror::Error;

/// Convenience alias for `Result<T, StrataError>`.
pub type StrataResult<T> = Result<T, StrataError>;

/// Error classification by statement phase.
///
/// - `Prepare`   — routing / plan validation / consistency failure; the
///   statement fails before any worker is built.
/// - `Execution` — a worker or batch failed against its shard; sibling
///   effects on other shards may already be applied.
/// - `Config`    — invalid table rule or middleware configuration.
/// - `Internal`  — should never happen; logged with its error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Prepare,
    Execution,
    Config,
    Internal,
}

/// Top-level error type that every layer-specific error converts into.
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<StrataError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Rule-evaluation failures: the statement cannot be routed safely.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("sharding key `{column}` of `{table}` is NULL and no default node is configured")]
    NullShardingKey { table: String, column: String },

    #[error("`{table}` declares {declared} rule column(s) but its partitioner expects {expected}")]
    ArityMismatch {
        table: String,
        declared: usize,
        expected: usize,
    },

    #[error("rule column `{column}` does not exist in `{table}`")]
    UnknownRuleColumn { table: String, column: String },

    #[error("`{table}` lists {nodes} node(s) but its partitioner maps onto {expected}")]
    NodeCountMismatch {
        table: String,
        nodes: usize,
        expected: usize,
    },

    #[error("sharding key value is NULL and the partitioner has no default node")]
    NullKeyUnroutable,

    #[error("partitioner expects a {expected}-column key, got {got} value(s)")]
    WrongTupleWidth { expected: usize, got: usize },

    #[error("table rule for `{table}` is invalid and was not initialized")]
    Uninitialized { table: String },

    #[error("no table rule registered for `{table}`")]
    Unknown { table: String },

    #[error("no partitioner registered under `{class}`")]
    UnknownPartitioner { class: String },
}

/// Plan-validation failures.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error(
        "disallowed scan on `{table}`: achieved {achieved} but the table requires at least {required}"
    )]
    DisallowedScan {
        table: String,
        achieved: &'static str,
        required: &'static str,
    },
}

/// Cross-table node-consistency failures, raised at prepare time.
#[derive(Error, Debug)]
pub enum ConsistencyError {
    #[error("`{left}` and `{right}` are not node comparable (shard sets differ)")]
    NodeSetMismatch { left: String, right: String },

    #[error("`{table}` has no node on shard `{shard}`")]
    NoCounterpartNode { table: String, shard: String },

    #[error("join between `{left}` and `{right}` is not provably co-located on its sharding keys")]
    JoinNotColocated { left: String, right: String },
}

/// Per-node execution failures.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("worker on shard `{shard}` failed for `{object}`: {cause} (sql: {sql})")]
    Worker {
        shard: String,
        object: String,
        sql: String,
        cause: String,
    },

    #[error("backend error on shard `{shard}`: {message}")]
    Backend { shard: String, message: String },

    #[error("no connection available for shard `{shard}`")]
    NoConnection { shard: String },

    #[error("statement deadline of {deadline_ms}ms exceeded on shard `{shard}`")]
    DeadlineExceeded { shard: String, deadline_ms: u64 },

    #[error("statement cancelled by session")]
    Cancelled,

    #[error("worker thread for shard `{shard}` panicked")]
    WorkerPanic { shard: String },
}

/// Bulk insert / merge batching failures.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("batch flush of {rows} row(s) to shard `{shard}` failed: {cause}")]
    FlushFailed {
        shard: String,
        rows: usize,
        cause: String,
    },
}

/// Configuration failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("bucket assignment table invalid: {reason}")]
    BucketTable { reason: String },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    #[error("config parse error: {0}")]
    Parse(String),
}

impl StrataError {
    /// Classify this error by statement phase.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::Rule(_) | StrataError::Plan(_) | StrataError::Consistency(_) => {
                ErrorKind::Prepare
            }
            StrataError::Exec(_) | StrataError::Batch(_) => ErrorKind::Execution,
            StrataError::Config(_) => ErrorKind::Config,
            StrataError::Context { source, .. } => source.kind(),
            StrataError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable, machine-readable error code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            StrataError::Rule(_) => "STR-RULE",
            StrataError::Plan(_) => "STR-SCAN",
            StrataError::Consistency(_) => "STR-NODE",
            StrataError::Exec(_) => "STR-EXEC",
            StrataError::Batch(_) => "STR-BATCH",
            StrataError::Config(_) => "STR-CONF",
            StrataError::Context { source, .. } => source.code(),
            StrataError::Internal(_) => "STR-INTERNAL",
        }
    }

    /// True when the statement failed before any worker was built.
    pub fn is_prepare_failure(&self) -> bool {
        matches!(self.kind(), ErrorKind::Prepare)
    }

    /// True when a worker or batch failed after dispatch began.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self.kind(), ErrorKind::Execution)
    }

    /// Wrap with a context string, preserving classification and code.
    pub fn with_context(self, ctx: impl Into<String>) -> Self {
        StrataError::Context {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Emit a structured log entry for internal errors. Must be called
    /// before an `Internal` error is returned to a client.
    pub fn log_if_internal(&self) {
        if self.kind() == ErrorKind::Internal {
            tracing::error!(code = self.code(), "internal error: {self}");
        }
    }
}

/// Add context to a `Result`, preserving error classification.
/// Usage: `route(rule, bounds).ctx("stage=route")?`
pub trait ErrorContext<T> {
    fn ctx(self, context: &str) -> StrataResult<T>;
    fn ctx_with(self, f: impl FnOnce() -> String) -> StrataResult<T>;
}

impl<T, E: Into<StrataError>> ErrorContext<T> for Result<T, E> {
    fn ctx(self, context: &str) -> StrataResult<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn ctx_with(self, f: impl FnOnce() -> String) -> StrataResult<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}
