//! The condition extractor's output: per rule-column predicate bounds.

use strata_common::Datum;

/// Bounds extracted from a statement's predicates for one rule column.
/// The sole routing input besides the table rule itself.
#[derive(Debug, Clone, Default)]
pub struct ColumnBounds {
    /// Lower bound (`>=` / `>` collapsed by the extractor).
    pub start: Option<Datum>,
    /// Upper bound (`<=` / `<` collapsed by the extractor).
    pub end: Option<Datum>,
    /// Explicit enumerated values (`=` or `IN (...)`).
    pub in_values: Option<Vec<Datum>>,
}

impl ColumnBounds {
    /// No usable predicate on this column.
    pub fn none() -> Self {
        Self::default()
    }

    /// A single equality value.
    pub fn point(value: Datum) -> Self {
        Self {
            in_values: Some(vec![value]),
            ..Self::default()
        }
    }

    /// An explicit in-list.
    pub fn in_list(values: Vec<Datum>) -> Self {
        Self {
            in_values: Some(values),
            ..Self::default()
        }
    }

    /// A closed or half-open range.
    pub fn range(start: Option<Datum>, end: Option<Datum>) -> Self {
        Self {
            start,
            end,
            in_values: None,
        }
    }

    /// True when an in-list with at least one member is present.
    pub fn has_in_values(&self) -> bool {
        self.in_values.as_ref().is_some_and(|v| !v.is_empty())
    }

    /// True when at least one range bound is present.
    pub fn has_range(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}
