/// Computes ln(sum(exp(values))) without underflow at extreme magnitudes.
/// Used to mix per-haplotype likelihoods 0.5*P1 + 0.5*P2 in log space.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_direct_sum_for_moderate_values() {
        let values = [0.5_f64.ln(), 0.25_f64.ln(), 0.25_f64.ln()];
        assert!((log_sum_exp(&values) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn survives_extreme_magnitudes() {
        let values = [-1000.0, -1000.0];
        let expected = -1000.0 + 2.0_f64.ln();
        assert!((log_sum_exp(&values) - expected).abs() < 1e-9);
    }

    #[test]
    fn all_zero_probability_stays_log_zero() {
        let values = [f64::NEG_INFINITY, f64::NEG_INFINITY];
        assert_eq!(log_sum_exp(&values), f64::NEG_INFINITY);
    }

    #[test]
    fn single_term_is_identity() {
        assert!((log_sum_exp(&[-3.5]) - (-3.5)).abs() < 1e-12);
    }
}
