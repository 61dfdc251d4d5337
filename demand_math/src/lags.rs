//! Lagged views of a series

use crate::{MathError, Result};

/// Value `k` positions earlier for every index; `None` for the first `k` entries.
pub fn lag(values: &[f64], k: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| i.checked_sub(k).map(|j| values[j]))
        .collect()
}

/// Value `k` positions before `index`, failing when that falls before the series start
pub fn lagged_value(values: &[f64], index: usize, k: usize) -> Result<f64> {
    let source = index.checked_sub(k).ok_or_else(|| {
        MathError::InsufficientData(format!(
            "Lag {} at index {} reaches before the start of the series",
            k, index
        ))
    })?;

    values.get(source).copied().ok_or_else(|| {
        MathError::InvalidInput(format!(
            "Index {} is outside a series of {} values",
            source,
            values.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)])]
    #[case(1, vec![None, Some(1.0), Some(2.0), Some(3.0)])]
    #[case(3, vec![None, None, None, Some(1.0)])]
    #[case(5, vec![None, None, None, None])]
    fn test_lag(#[case] k: usize, #[case] expected: Vec<Option<f64>>) {
        assert_eq!(lag(&[1.0, 2.0, 3.0, 4.0], k), expected);
    }

    #[test]
    fn test_lagged_value() {
        let values = [5.0, 6.0, 7.0];
        assert_eq!(lagged_value(&values, 2, 2).unwrap(), 5.0);
        assert!(matches!(
            lagged_value(&values, 1, 2),
            Err(MathError::InsufficientData(_))
        ));
        assert!(matches!(
            lagged_value(&values, 5, 1),
            Err(MathError::InvalidInput(_))
        ));
    }
}
