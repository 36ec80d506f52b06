//! Discrete range enumeration for range predicates on the sharding key.
//!
//! Any partitioner can answer a range predicate precisely when the bounds
//! are discrete and close together: enumerate every value in `[begin,
//! end]` and union the per-value lookups. When that is impossible the
//! caller must broadcast — visiting an unnecessary node is acceptable,
//! skipping a necessary one never is.

use strata_common::Datum;

/// Enumerate every discrete value in `[begin, end]`.
///
/// Returns `None` (caller broadcasts) when either bound is NULL, the
/// bounds are of different types, the type has no discrete ordinal, the
/// range is empty, or the span exceeds `max_span` values.
pub fn enumerate_range(begin: &Datum, end: &Datum, max_span: u64) -> Option<Vec<Datum>> {
    if begin.is_null() || end.is_null() || !begin.same_type(end) {
        return None;
    }
    let lo = begin.as_enumerable()?;
    let hi = end.as_enumerable()?;
    if lo > hi {
        return None;
    }
    // wrapping_sub + cast yields the correct unsigned distance for any
    // i64 pair with lo <= hi.
    let span = (hi.wrapping_sub(lo) as u64).saturating_add(1);
    if span > max_span {
        return None;
    }
    Some(
        (lo..=hi)
            .map(|ordinal| Datum::from_enumerable(begin, ordinal))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumerates_inclusive_span() {
        let values = enumerate_range(&Datum::Int64(1), &Datum::Int64(5), 200).unwrap();
        assert_eq!(
            values,
            (1..=5).map(Datum::Int64).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_single_value_span() {
        let values = enumerate_range(&Datum::Int32(7), &Datum::Int32(7), 200).unwrap();
        assert_eq!(values, vec![Datum::Int32(7)]);
    }

    #[test]
    fn test_preserves_bound_type() {
        let values = enumerate_range(&Datum::Date(10), &Datum::Date(12), 200).unwrap();
        assert_eq!(values, vec![Datum::Date(10), Datum::Date(11), Datum::Date(12)]);
    }

    #[test]
    fn test_span_cap_is_inclusive() {
        assert!(enumerate_range(&Datum::Int64(1), &Datum::Int64(200), 200).is_some());
        assert!(enumerate_range(&Datum::Int64(1), &Datum::Int64(201), 200).is_none());
    }

    #[test]
    fn test_rejects_mixed_types() {
        assert!(enumerate_range(&Datum::Int32(1), &Datum::Int64(5), 200).is_none());
    }

    #[test]
    fn test_rejects_non_ordinal_types() {
        assert!(enumerate_range(&Datum::Text("a".into()), &Datum::Text("b".into()), 200).is_none());
        assert!(enumerate_range(&Datum::Float64(1.0), &Datum::Float64(2.0), 200).is_none());
    }

    #[test]
    fn test_rejects_null_bounds_and_empty_ranges() {
        assert!(enumerate_range(&Datum::Null, &Datum::Int64(5), 200).is_none());
        assert!(enumerate_range(&Datum::Int64(5), &Datum::Null, 200).is_none());
        assert!(enumerate_range(&Datum::Int64(9), &Datum::Int64(1), 200).is_none());
    }

    #[test]
    fn test_negative_spans() {
        let values = enumerate_range(&Datum::Int64(-2), &Datum::Int64(1), 200).unwrap();
        assert_eq!(values.len(), 4);
    }
}
