// Comparison of device results against host references

use std::fmt::Display;

use crate::error::{Error, Mismatch, Result};

/// Mismatching positions carried in a consistency error.
pub const MAX_REPORTED_MISMATCHES: usize = 8;

/// Average relative difference tolerated for floating-point results.
pub const RELATIVE_TOLERANCE: f64 = 0.01;

/// Element-wise exact comparison.
pub fn compare_exact<T: PartialEq + Display>(what: &str, expected: &[T], actual: &[T]) -> Result<()> {
    if expected.len() != actual.len() {
        return Err(Error::Transfer {
            label: what.to_string(),
            expected: expected.len(),
            actual: actual.len(),
        });
    }

    let mut mismatches = Vec::new();
    let mut total = 0;
    for (index, (e, a)) in expected.iter().zip(actual).enumerate() {
        if e != a {
            total += 1;
            if mismatches.len() < MAX_REPORTED_MISMATCHES {
                mismatches.push(Mismatch {
                    index,
                    expected: e.to_string(),
                    actual: a.to_string(),
                });
            }
        }
    }

    if total > 0 {
        return Err(Error::Consistency {
            what: what.to_string(),
            mismatches,
            total,
        });
    }
    Ok(())
}

/// Exact comparison of a single value.
pub fn compare_value<T: PartialEq + Display>(what: &str, expected: T, actual: T) -> Result<()> {
    compare_exact(what, std::slice::from_ref(&expected), std::slice::from_ref(&actual))
}

/// Mean over all elements of `|expected - actual| / max(|expected|, |actual|)`.
/// Pairs that are both zero count as equal.
pub fn average_relative_difference(expected: &[f32], actual: &[f32]) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let total: f64 = expected
        .iter()
        .zip(actual)
        .map(|(&e, &a)| {
            let (e, a) = (e as f64, a as f64);
            let scale = e.abs().max(a.abs());
            if scale == 0.0 {
                0.0
            } else {
                (e - a).abs() / scale
            }
        })
        .sum();
    total / expected.len() as f64
}

/// Tolerance comparison. Returns the measured average relative difference.
pub fn compare_relative(what: &str, expected: &[f32], actual: &[f32], threshold: f64) -> Result<f64> {
    if expected.len() != actual.len() {
        return Err(Error::Transfer {
            label: what.to_string(),
            expected: expected.len(),
            actual: actual.len(),
        });
    }
    let diff = average_relative_difference(expected, actual);
    // NaN must fail too
    if !(diff <= threshold) {
        return Err(Error::Tolerance {
            what: what.to_string(),
            average_relative_difference: diff,
            threshold,
        });
    }
    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(compare_exact("scan", &[1u32, 2, 3], &[1, 2, 3]).is_ok());
        assert!(compare_exact::<u32>("empty", &[], &[]).is_ok());
    }

    #[test]
    fn test_mismatches_are_capped() {
        let expected = vec![0u32; 20];
        let actual: Vec<u32> = (0..20).collect();
        match compare_exact("sort", &expected, &actual) {
            Err(Error::Consistency {
                mismatches, total, ..
            }) => {
                assert_eq!(total, 19);
                assert_eq!(mismatches.len(), MAX_REPORTED_MISMATCHES);
                assert_eq!(mismatches[0].index, 1);
                assert_eq!(mismatches[0].actual, "1");
            }
            other => panic!("expected a consistency error, got {other:?}"),
        }
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            compare_exact("sort", &[1u32], &[1, 2]),
            Err(Error::Transfer { expected: 1, actual: 2, .. })
        ));
    }

    #[test]
    fn test_single_value() {
        assert!(compare_value("sum", 10u32, 10).is_ok());
        assert!(compare_value("sum", 10u32, 11).is_err());
    }

    #[test]
    fn test_relative_tolerance() {
        let expected = [1.0f32, 2.0, 0.0, 4.0];
        let close = [1.001f32, 2.0, 0.0, 4.0];
        let diff = compare_relative("matmul", &expected, &close, RELATIVE_TOLERANCE).unwrap();
        assert!(diff < 0.001);

        let far = [2.0f32, 2.0, 0.0, 4.0];
        assert!(matches!(
            compare_relative("matmul", &expected, &far, RELATIVE_TOLERANCE),
            Err(Error::Tolerance { .. })
        ));

        let nan = [f32::NAN, 2.0, 0.0, 4.0];
        assert!(compare_relative("matmul", &expected, &nan, RELATIVE_TOLERANCE).is_err());
    }
}
