use crate::NonlinearSolver;
use crate::kdtree::KdTree;

const DEFAULT_MIN_SEPARATION: f64 = 1e-6;
const DEFAULT_CAPACITY: usize = 4096;

/// Memoising wrapper: remembers `(p, z)` pairs of converged solves in a K-D
/// tree and seeds the base solver from the nearest remembered parameter.
///
/// Inserts are gated by a minimum parameter-space separation and a capacity
/// cap; on overflow the older half of the entries is dropped and the tree
/// rebuilt, so a long simulation cannot grow the cache without bound.
pub struct CachingSolver<S: NonlinearSolver> {
    base: S,
    tree: KdTree,
    ps: Vec<Vec<f64>>,
    zs: Vec<Vec<f64>>,
    zbuf: Vec<f64>,
    min_separation_sq: f64,
    capacity: usize,
    converged: bool,
}

impl<S: NonlinearSolver> CachingSolver<S> {
    pub fn new(base: S) -> Self {
        let (np, nn) = (base.np(), base.nn());
        CachingSolver {
            tree: KdTree::new(np.max(1)),
            ps: Vec::new(),
            zs: Vec::new(),
            zbuf: vec![0.0; nn],
            min_separation_sq: DEFAULT_MIN_SEPARATION * DEFAULT_MIN_SEPARATION,
            capacity: DEFAULT_CAPACITY,
            converged: false,
            base,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(2);
        self
    }

    pub fn with_min_separation(mut self, sep: f64) -> Self {
        self.min_separation_sq = sep * sep;
        self
    }

    pub fn cached_entries(&self) -> usize {
        self.ps.len()
    }

    fn remember(&mut self, p: &[f64]) {
        if self.ps.len() == self.capacity {
            // evict the older half and rebuild
            let keep = self.capacity / 2;
            self.ps.drain(..self.ps.len() - keep);
            self.zs.drain(..self.zs.len() - keep);
            self.tree = KdTree::build(self.tree_dim(), &self.ps);
        }
        self.ps.push(p.to_vec());
        self.zs.push(self.zbuf.clone());
        self.tree.insert(p);
    }

    fn tree_dim(&self) -> usize {
        self.base.np().max(1)
    }
}

impl<S: NonlinearSolver> NonlinearSolver for CachingSolver<S> {
    fn solve(&mut self, p: &[f64]) -> &[f64] {
        let nearest = self.tree.nearest(p);
        if let Some((idx, d2)) = nearest {
            // only re-seed when the cache knows a closer point than the
            // base solver's own origin
            if d2 < self.base.origin_distance_sq(p) {
                self.base.set_origin(&self.ps[idx], &self.zs[idx]);
            }
        }
        let z = self.base.solve(p);
        self.zbuf.copy_from_slice(z);
        self.converged = self.base.has_converged();
        if self.converged {
            let fresh = match nearest {
                None => true,
                Some((_, d2)) => d2 > self.min_separation_sq,
            };
            if fresh {
                self.remember(p);
            }
        }
        &self.zbuf
    }

    fn has_converged(&self) -> bool {
        self.converged
    }

    fn set_origin(&mut self, p: &[f64], z: &[f64]) {
        self.base.set_origin(p, z);
    }

    fn set_resabstol(&mut self, tol: f64) {
        self.base.set_resabstol(tol);
    }

    fn origin_distance_sq(&self, p: &[f64]) -> f64 {
        let base = self.base.origin_distance_sq(p);
        match self.tree.nearest(p) {
            Some((_, d2)) => base.min(d2),
            None => base,
        }
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

    fn quadratic() -> ParametricEq {
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
    fn repeated_parameters_do_not_grow_the_cache() {
        let mut s = CachingSolver::new(SimpleSolver::new(quadratic()));
        s.set_origin(&[0.0], &[1.0]);
        for _ in 0..3 {
            for i in 0..10 {
                let p = 0.05 * i as f64;
                let z = s.solve(&[p]).to_vec();
                assert!(s.has_converged());
                assert!((z[0] - (1.0 - p).sqrt()).abs() < 1e-8);
            }
        }
        // the second and third sweeps revisit known parameters exactly
        assert_eq!(s.cached_entries(), 10);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut s = CachingSolver::new(SimpleSolver::new(quadratic())).with_capacity(8);
        s.set_origin(&[0.0], &[1.0]);
        for i in 0..40 {
            let _ = s.solve(&[0.02 * i as f64]);
        }
        assert!(s.cached_entries() <= 8);
    }
}
