use crate::constants::{THERMAL_VOLTAGE, exp_lin};
use crate::prelude::*;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BjtKind {
    Npn,
    Pnp,
}

#[derive(Clone, Copy, Debug)]
pub struct BjtParams {
    /// Transport saturation current.
    pub is: f64,
    /// Emission coefficient shared by both junctions.
    pub eta: f64,
    /// Forward current gain β_F.
    pub beta_f: f64,
    /// Reverse current gain β_R.
    pub beta_r: f64,
}

impl Default for BjtParams {
    fn default() -> Self {
        BjtParams {
            is: 1e-12,
            eta: 1.0,
            beta_f: 100.0,
            beta_r: 10.0,
        }
    }
}

/// Ebers-Moll bipolar transistor in the coupled-diode form.
///
/// Branch 0 runs base→emitter, branch 1 base→collector, and the port vector
/// is `q = (v_be, v_bc, i_be, i_bc)`. With the junction currents
/// `i_f = I_ES·(exp(v_be/ηV_T) − 1)` and `i_r = I_CS·(exp(v_bc/ηV_T) − 1)`
/// the residuals are `i_f − α_R·i_r − i_be` and `i_r − α_F·i_f − i_bc`;
/// PNP parity flips the sign of every port quantity.
pub fn bjt(kind: BjtKind, params: BjtParams) -> Element {
    let pol = match kind {
        BjtKind::Npn => 1.0,
        BjtKind::Pnp => -1.0,
    };
    let af = params.beta_f / (params.beta_f + 1.0);
    let ar = params.beta_r / (params.beta_r + 1.0);
    // reciprocity: α_F·I_ES = α_R·I_CS = I_S
    let ies = params.is / af;
    let ics = params.is / ar;
    let n_vt = params.eta * THERMAL_VOLTAGE;

    let func: ResidualFn = Arc::new(move |q, res, jq| {
        let (ef, def) = exp_lin(pol * q[0] / n_vt);
        let (er, der) = exp_lin(pol * q[1] / n_vt);
        let i_f = ies * (ef - 1.0);
        let i_r = ics * (er - 1.0);
        res[0] = i_f - ar * i_r - pol * q[2];
        res[1] = i_r - af * i_f - pol * q[3];
        let gf = pol * ies * def / n_vt;
        let gr = pol * ics * der / n_vt;
        jq[0] = gf;
        jq[1] = -ar * gr;
        jq[2] = -pol;
        jq[3] = 0.0;
        jq[4] = -af * gf;
        jq[5] = gr;
        jq[6] = 0.0;
        jq[7] = -pol;
    });

    ElementBuilder::new()
        .mv(RatMat::from_rows(&[
            vec![rat(1), rat(0)],
            vec![rat(0), rat(1)],
            vec![rat(0), rat(0)],
            vec![rat(0), rat(0)],
        ]))
        .mi(RatMat::from_rows(&[
            vec![rat(0), rat(0)],
            vec![rat(0), rat(0)],
            vec![rat(1), rat(0)],
            vec![rat(0), rat(1)],
        ]))
        .mq(RatMat::from_rows(&[
            vec![rat(-1), rat(0), rat(0), rat(0)],
            vec![rat(0), rat(-1), rat(0), rat(0)],
            vec![rat(0), rat(0), rat(-1), rat(0)],
            vec![rat(0), rat(0), rat(0), rat(-1)],
        ]))
        .nonlinear(2, func)
        .pin("base", 0, 1)
        .pin("base", 1, 1)
        .pin("emitter", 0, -1)
        .pin("collector", 1, -1)
        .build()
        .expect("bjt matrices are consistent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_coupled_unknowns() {
        let q = bjt(BjtKind::Npn, BjtParams::default());
        assert_eq!((q.nl(), q.nb(), q.nq(), q.nn()), (4, 2, 4, 2));
        assert_eq!(q.pin_entries("base").len(), 2);
    }

    #[test]
    fn cutoff_carries_no_current() {
        let q = bjt(BjtKind::Npn, BjtParams::default());
        let f = q.nonlinearity.as_ref().unwrap().func.clone();
        let mut res = [f64::NAN; 2];
        let mut jq = [0.0; 8];
        f(&[0.0, 0.0, 0.0, 0.0], &mut res, &mut jq);
        assert_eq!(res, [0.0, 0.0]);
    }

    #[test]
    fn npn_and_pnp_are_mirror_images() {
        let p = BjtParams::default();
        let npn = bjt(BjtKind::Npn, p);
        let pnp = bjt(BjtKind::Pnp, p);
        let fn_npn = npn.nonlinearity.as_ref().unwrap().func.clone();
        let fn_pnp = pnp.nonlinearity.as_ref().unwrap().func.clone();
        let q = [0.65, -2.0, 1e-3, -5e-3];
        let qm: Vec<f64> = q.iter().map(|v| -v).collect();
        let (mut r1, mut r2) = ([0.0; 2], [0.0; 2]);
        let (mut j1, mut j2) = ([0.0; 8], [0.0; 8]);
        fn_npn(&q, &mut r1, &mut j1);
        fn_pnp(&qm, &mut r2, &mut j2);
        assert!((r1[0] - r2[0]).abs() < 1e-15);
        assert!((r1[1] - r2[1]).abs() < 1e-15);
    }
}
