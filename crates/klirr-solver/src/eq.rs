use faer::Mat;
use klirr_numeric::{gemm, gemv_acc};

/// Residual callback in q-space: `(q, res, jq)` where `res` receives the
/// `nn` residual values and `jq` receives `∂res/∂q` (`nn × nq`).
pub type QFunc = Box<dyn FnMut(&[f64], &mut [f64], &mut Mat<f64>) + Send>;

/// A parametric nonlinear equation `res(z, p) = 0`.
///
/// The residual is evaluated through the intermediate vector
/// `q = q0 + pexp·p + fq·z`; the scratch holds `p_full = q0 + pexp·p`, the
/// assembled `q`, and the q-space Jacobian `Jq`, which is reused by both the
/// z-Jacobian (`J = Jq·fq`) and the parameter Jacobian (`Jp = Jq·pexp`)
/// within one iteration.
pub struct ParametricEq {
    q0: Vec<f64>,
    pexp: Mat<f64>,
    fq: Mat<f64>,
    func: QFunc,
    p_full: Vec<f64>,
    q: Vec<f64>,
    jq: Mat<f64>,
}

impl ParametricEq {
    pub fn new(q0: Vec<f64>, pexp: Mat<f64>, fq: Mat<f64>, func: QFunc) -> Self {
        let nq = q0.len();
        assert_eq!(pexp.nrows(), nq);
        assert_eq!(fq.nrows(), nq);
        let nn = fq.ncols();
        ParametricEq {
            p_full: q0.clone(),
            q: vec![0.0; nq],
            jq: Mat::zeros(nn, nq),
            q0,
            pexp,
            fq,
            func,
        }
    }

    pub fn nq(&self) -> usize {
        self.q0.len()
    }

    pub fn np(&self) -> usize {
        self.pexp.ncols()
    }

    pub fn nn(&self) -> usize {
        self.fq.ncols()
    }

    /// p_full = q0 + pexp·p
    pub fn set_p(&mut self, p: &[f64]) {
        self.p_full.copy_from_slice(&self.q0);
        gemv_acc(&mut self.p_full, &self.pexp, p);
    }

    /// Evaluate the residual and `J = ∂res/∂z` at `z` under the parameter
    /// installed by the last [`ParametricEq::set_p`].
    pub fn eval(&mut self, z: &[f64], res: &mut [f64], j: &mut Mat<f64>) {
        let Self {
            func,
            p_full,
            q,
            jq,
            fq,
            ..
        } = self;
        q.copy_from_slice(p_full);
        gemv_acc(q, fq, z);
        func(q, res, jq);
        gemm(j, jq, fq);
    }

    /// `Jp = Jq·pexp` from the scratch Jacobian of the last `eval`.
    pub fn calc_jp(&self, jp: &mut Mat<f64>) {
        gemm(jp, &self.jq, &self.pexp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// res(z, p) = z² − 1 + p via q = (p, z).
    pub(crate) fn quadratic_eq() -> ParametricEq {
        let mut pexp = Mat::zeros(2, 1);
        pexp[(0, 0)] = 1.0;
        let mut fq = Mat::zeros(2, 1);
        fq[(1, 0)] = 1.0;
        let func: QFunc = Box::new(|q, res, jq| {
            res[0] = q[1] * q[1] - 1.0 + q[0];
            jq[(0, 0)] = 1.0;
            jq[(0, 1)] = 2.0 * q[1];
        });
        ParametricEq::new(vec![0.0, 0.0], pexp, fq, func)
    }

    #[test]
    fn jacobians_compose() {
        let mut eq = quadratic_eq();
        eq.set_p(&[0.25]);
        let mut res = [0.0];
        let mut j = Mat::zeros(1, 1);
        eq.eval(&[3.0], &mut res, &mut j);
        assert_eq!(res[0], 9.0 - 1.0 + 0.25);
        assert_eq!(j[(0, 0)], 6.0);
        let mut jp = Mat::zeros(1, 1);
        eq.calc_jp(&mut jp);
        assert_eq!(jp[(0, 0)], 1.0);
    }
}
