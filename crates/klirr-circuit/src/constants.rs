/// Thermal voltage kT/q at room temperature, in volts.
pub const THERMAL_VOLTAGE: f64 = 25e-3;

/// Exponent ceiling for junction laws. Beyond it the exponential continues
/// linearly so a wild Newton step cannot overflow to infinity.
pub(crate) const EXP_LIMIT: f64 = 200.0;

/// `exp` with linear continuation above [`EXP_LIMIT`]; returns the value and
/// its derivative.
pub(crate) fn exp_lin(x: f64) -> (f64, f64) {
    if x <= EXP_LIMIT {
        let e = x.exp();
        (e, e)
    } else {
        let e = EXP_LIMIT.exp();
        (e * (1.0 + (x - EXP_LIMIT)), e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_lin_is_continuous_at_the_limit() {
        let below = exp_lin(EXP_LIMIT - 1e-9).0;
        let above = exp_lin(EXP_LIMIT + 1e-9).0;
        assert!((below - above).abs() / below < 1e-6);
        assert!(exp_lin(500.0).0.is_finite());
    }
}
