use crate::NonlinearSolver;

/// Smallest admissible λ step before the continuation gives up.
const MIN_STEP: f64 = 9.5367431640625e-7; // 2⁻²⁰

/// Continuation wrapper: when the base solver fails outright, the parameter
/// is walked from the last known-good anchor toward the target along
/// `p(λ) = (1−λ)·p_anchor + λ·p_target`, halving the step on failure and
/// doubling it after success, carrying each intermediate solution forward
/// as seed and anchor.
pub struct HomotopySolver<S: NonlinearSolver> {
    base: S,
    anchor_p: Vec<f64>,
    anchor_z: Vec<f64>,
    anchor_ok: bool,
    ptry: Vec<f64>,
    zgood: Vec<f64>,
    zbuf: Vec<f64>,
    converged: bool,
}

impl<S: NonlinearSolver> HomotopySolver<S> {
    pub fn new(base: S) -> Self {
        let (np, nn) = (base.np(), base.nn());
        HomotopySolver {
            anchor_p: vec![0.0; np],
            anchor_z: vec![0.0; nn],
            anchor_ok: false,
            ptry: vec![0.0; np],
            zgood: vec![0.0; nn],
            zbuf: vec![0.0; nn],
            converged: false,
            base,
        }
    }

    fn accept(&mut self, p: &[f64]) {
        self.anchor_p.copy_from_slice(p);
        self.anchor_z.copy_from_slice(&self.zbuf);
        self.anchor_ok = true;
    }

    fn interpolate(&mut self, target: &[f64], lam: f64) {
        for ((t, a), v) in self
            .ptry
            .iter_mut()
            .zip(self.anchor_p.iter())
            .zip(target.iter())
        {
            *t = (1.0 - lam) * a + lam * v;
        }
    }
}

impl<S: NonlinearSolver> NonlinearSolver for HomotopySolver<S> {
    fn solve(&mut self, p: &[f64]) -> &[f64] {
        let z = self.base.solve(p);
        self.zbuf.copy_from_slice(z);
        if self.base.has_converged() {
            self.converged = true;
            self.accept(p);
            return &self.zbuf;
        }
        if !self.anchor_ok {
            self.converged = false;
            return &self.zbuf;
        }

        // continuation from the anchor
        self.base.set_origin(&self.anchor_p, &self.anchor_z);
        self.zgood.copy_from_slice(&self.anchor_z);
        let mut lam_good = 0.0f64;
        let mut step = 0.5f64;
        loop {
            let lam = (lam_good + step).min(1.0);
            self.interpolate(p, lam);
            let z = self.base.solve(&self.ptry);
            self.zbuf.copy_from_slice(z);
            if self.base.has_converged() {
                if lam >= 1.0 {
                    self.converged = true;
                    self.accept(p);
                    return &self.zbuf;
                }
                lam_good = lam;
                self.zgood.copy_from_slice(&self.zbuf);
                step *= 2.0;
            } else {
                step *= 0.5;
                if step < MIN_STEP {
                    self.converged = false;
                    return &self.zbuf;
                }
                // re-seed at the last good point before the next attempt
                self.interpolate(p, lam_good);
                self.base.set_origin(&self.ptry, &self.zgood);
            }
        }
    }

    fn has_converged(&self) -> bool {
        self.converged
    }

    fn set_origin(&mut self, p: &[f64], z: &[f64]) {
        self.anchor_p.copy_from_slice(p);
        self.anchor_z.copy_from_slice(z);
        self.anchor_ok = true;
        self.base.set_origin(p, z);
    }

    fn set_resabstol(&mut self, tol: f64) {
        self.base.set_resabstol(tol);
    }

    fn origin_distance_sq(&self, p: &[f64]) -> f64 {
        self.base.origin_distance_sq(p)
    }

    fn np(&self) -> usize {
        self.base.np()
    }

    fn nn(&self) -> usize {
        self.base.nn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eq::{ParametricEq, QFunc};
    use crate::simple::SimpleSolver;
    use faer::Mat;

    /// res(z, p) = z² − 1 + p: two real roots for p < 1, none for p > 1.
    fn fold() -> ParametricEq {
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
    fn converges_below_the_fold() {
        let mut s = HomotopySolver::new(SimpleSolver::new(fold()));
        s.set_origin(&[0.0], &[1.0]);
        for &p in &[0.9, 0.99, 0.999, -5.0, 0.5] {
            let z = s.solve(&[p]).to_vec();
            assert!(s.has_converged(), "p = {p}");
            assert!((z[0].abs() - (1.0 - p).sqrt()).abs() < 1e-7);
        }
    }

    #[test]
    fn fails_beyond_the_fold() {
        let mut s = HomotopySolver::new(SimpleSolver::new(fold()));
        s.set_origin(&[0.0], &[1.0]);
        let _ = s.solve(&[1.5]);
        assert!(!s.has_converged());
    }

    #[test]
    fn continuation_crosses_a_hard_jump() {
        let mut s = HomotopySolver::new(SimpleSolver::new(fold()));
        s.set_origin(&[0.0], &[1.0]);
        // a direct leap to p = 0.9999 from z = 1 is a stretch for plain
        // Newton with a stale origin; the continuation must cope
        let z = s.solve(&[0.9999]).to_vec();
        assert!(s.has_converged());
        assert!((z[0].abs() - 0.01).abs() < 1e-6);
    }
}
