//! Assertions over exported rows.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections hold the same elements with the same
/// multiplicities, ignoring order.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// # Example
///
/// ```
/// use clinical_export::testing::assert_rows_unordered_equal;
///
/// let actual = vec![vec!["b"], vec!["a"], vec!["a"]];
/// let expected = vec![vec!["a"], vec!["a"], vec!["b"]];
/// assert_rows_unordered_equal(&actual, &expected);
/// ```
pub fn assert_rows_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Row count mismatch:\n  Expected: {}\n  Actual: {}\n  Expected rows: {expected:?}\n  Actual rows: {actual:?}",
        expected.len(),
        actual.len()
    );

    fn counts<T: Eq + Hash>(rows: &[T]) -> HashMap<&T, usize> {
        let mut m = HashMap::new();
        for r in rows {
            *m.entry(r).or_default() += 1;
        }
        m
    }
    let actual_counts = counts(actual);
    let expected_counts = counts(expected);

    if actual_counts != expected_counts {
        let missing: Vec<_> = expected_counts
            .iter()
            .filter(|(r, n)| actual_counts.get(*r) != Some(*n))
            .map(|(r, _)| r)
            .collect();
        let extra: Vec<_> = actual_counts
            .iter()
            .filter(|(r, n)| expected_counts.get(*r) != Some(*n))
            .map(|(r, _)| r)
            .collect();
        panic!(
            "Row content mismatch:\n  Missing or miscounted: {missing:?}\n  Unexpected or miscounted: {extra:?}"
        );
    }
}

/// Assert that every row satisfies `predicate`.
///
/// # Panics
///
/// Panics on the first row that does not.
pub fn assert_all_rows<T: Debug>(rows: &[T], predicate: impl Fn(&T) -> bool) {
    for (i, row) in rows.iter().enumerate() {
        assert!(predicate(row), "Predicate failed for row {i}: {row:?}");
    }
}
