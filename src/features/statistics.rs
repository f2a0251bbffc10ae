/// Arithmetic mean, or 0.0 for an empty series.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, or 0.0 for an empty series.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mu = mean(values);
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Mean over every cell of a frames-by-bins matrix.
pub(crate) fn grand_mean(matrix: &[Vec<f64>]) -> f64 {
    let (sum, count) = matrix.iter().fold((0.0, 0usize), |(sum, count), row| {
        (sum + row.iter().sum::<f64>(), count + row.len())
    });
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Per-column mean of a frames-by-coefficients matrix.
pub(crate) fn column_means(matrix: &[Vec<f64>], columns: usize) -> Vec<f64> {
    let mut sums = vec![0.0; columns];
    for row in matrix {
        for (sum, value) in sums.iter_mut().zip(row.iter()) {
            *sum += value;
        }
    }
    if matrix.is_empty() {
        return sums;
    }
    sums.iter().map(|sum| sum / matrix.len() as f64).collect()
}

/// Replace NaN or infinite statistics with 0.0.
pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_series_fall_back_to_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
        assert_eq!(grand_mean(&[]), 0.0);
        assert_eq!(column_means(&[], 3), vec![0.0; 3]);
    }

    #[test]
    fn std_is_population_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), 5.0);
        assert_eq!(std_dev(&values), 2.0);
    }

    #[test]
    fn column_means_average_rows() {
        let matrix = vec![vec![1.0, 2.0], vec![3.0, 6.0]];
        assert_eq!(column_means(&matrix, 2), vec![2.0, 4.0]);
        assert_eq!(grand_mean(&matrix), 3.0);
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
    }
}
