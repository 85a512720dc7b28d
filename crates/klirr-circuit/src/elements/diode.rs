use crate::constants::{THERMAL_VOLTAGE, exp_lin};
use crate::prelude::*;

/// Shockley diode.
///
/// The branch quantities are routed through `q = (v_d, i_d)` and the single
/// nonlinear equation is `Is·(exp(v_d/(η·V_T)) − 1) − i_d = 0`.
pub fn diode(is: f64, eta: f64) -> Element {
    let n_vt = eta * THERMAL_VOLTAGE;
    let func: ResidualFn = Arc::new(move |q, res, jq| {
        let (e, de) = exp_lin(q[0] / n_vt);
        res[0] = is * (e - 1.0) - q[1];
        jq[0] = is * de / n_vt;
        jq[1] = -1.0;
    });
    ElementBuilder::new()
        .mv(RatMat::from_rows(&[vec![rat(1)], vec![rat(0)]]))
        .mi(RatMat::from_rows(&[vec![rat(0)], vec![rat(1)]]))
        .mq(RatMat::from_rows(&[
            vec![rat(-1), rat(0)],
            vec![rat(0), rat(-1)],
        ]))
        .nonlinear(1, func)
        .pin("+", 0, 1)
        .pin("-", 0, -1)
        .build()
        .expect("diode matrices are consistent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_nonlinear_unknown() {
        let d = diode(1e-12, 1.0);
        assert_eq!((d.nl(), d.nb(), d.nq(), d.nn()), (2, 1, 2, 1));
        assert!(d.nonlinearity.is_some());
    }

    #[test]
    fn residual_vanishes_at_the_origin() {
        let d = diode(1e-12, 1.0);
        let f = d.nonlinearity.as_ref().unwrap().func.clone();
        let mut res = [f64::NAN];
        let mut jq = [0.0; 2];
        f(&[0.0, 0.0], &mut res, &mut jq);
        assert_eq!(res[0], 0.0);
        assert!(jq[0] > 0.0);
        assert_eq!(jq[1], -1.0);
    }

    #[test]
    fn forward_drop_matches_shockley() {
        let (is, eta) = (1e-12, 1.9);
        let d = diode(is, eta);
        let f = d.nonlinearity.as_ref().unwrap().func.clone();
        let vd = 0.6;
        let id = is * ((vd / (eta * THERMAL_VOLTAGE)).exp() - 1.0);
        let mut res = [f64::NAN];
        let mut jq = [0.0; 2];
        f(&[vd, id], &mut res, &mut jq);
        assert!(res[0].abs() < 1e-18);
    }
}
