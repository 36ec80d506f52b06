//! Static access-path planning for sharded tables.
//!
//! The middleware cannot see live row statistics without querying the
//! shards, so the cost model is purely structural: node counts, rule
//! columns, and declared indexes. Its job is not to squeeze the last
//! percent out of a query but to pick the cheapest *safe* access
//! strategy and to refuse statements that would fan out wider than the
//! table's configured scan level allows.

pub mod cache;
pub mod cost;
pub mod masks;
pub mod plan;

pub use cache::PlanCache;
pub use cost::{best_plan_item, Planner, ROW_COST};
pub use masks::{PredicateMasks, MASK_EQ, MASK_GT, MASK_LT, MASK_RANGE};
pub use plan::{PlanItem, ScanningStrategy};
