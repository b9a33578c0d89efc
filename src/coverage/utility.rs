/// Rounds to two decimals, the precision coverage values are reported at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Computes `sum(values[i] * weights[i])`. Returns 0.0 for empty input.
///
/// Weights are expected to be shares that already sum to (at most) one.
pub fn weighted_sum(values: &[f64], weights: &[f64]) -> f64 {
    values.iter().zip(weights).map(|(v, w)| v * w).sum()
}
