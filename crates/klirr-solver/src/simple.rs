use crate::eq::ParametricEq;
use crate::{NonlinearSolver, dist_sq, inf_norm};
use faer::Mat;
use klirr_numeric::{LinearSolver, gemv};

pub const DEFAULT_RESABSTOL: f64 = 1e-10;
const MAX_ITER: usize = 500;
const DAMPING_GROW: f64 = 1.5;
const DAMPING_SHRINK: f64 = 0.5;
const DAMPING_FLOOR: f64 = 1e-3;

/// Damped Newton iteration with a cached LU of the Jacobian.
///
/// A successfully solved `(p, z)` pair becomes the extrapolation origin:
/// the next solve is seeded with the first-order prediction
/// `z₀ − J₀⁻¹·Jp₀·(p − p₀)`, which for audio-rate parameter trajectories
/// lands close enough that one or two iterations usually suffice.
pub struct SimpleSolver {
    eq: ParametricEq,
    z: Vec<f64>,
    res: Vec<f64>,
    jac: Mat<f64>,
    lin: LinearSolver,
    dz: Vec<f64>,

    origin_p: Vec<f64>,
    origin_z: Vec<f64>,
    origin_jp: Mat<f64>,
    origin_lin: LinearSolver,
    origin_ok: bool,
    extrap: Vec<f64>,
    dp: Vec<f64>,

    resabstol: f64,
    converged: bool,
    iterations: usize,
}

impl SimpleSolver {
    pub fn new(eq: ParametricEq) -> Self {
        let (np, nn) = (eq.np(), eq.nn());
        SimpleSolver {
            eq,
            z: vec![0.0; nn],
            res: vec![0.0; nn],
            jac: Mat::zeros(nn, nn),
            lin: LinearSolver::new(nn),
            dz: vec![0.0; nn],
            origin_p: vec![0.0; np],
            origin_z: vec![0.0; nn],
            origin_jp: Mat::zeros(nn, np),
            origin_lin: LinearSolver::new(nn),
            origin_ok: false,
            extrap: vec![0.0; nn],
            dp: vec![0.0; np],
            resabstol: DEFAULT_RESABSTOL,
            converged: false,
            iterations: 0,
        }
    }

    /// Newton iterations spent by the last solve.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    fn refresh_origin(&mut self, p: &[f64]) {
        // jac and the scratch Jq hold values at the accepted solution
        self.origin_ok = self.origin_lin.setlhs(&self.jac);
        if self.origin_ok {
            self.eq.calc_jp(&mut self.origin_jp);
            self.origin_p.copy_from_slice(p);
            self.origin_z.copy_from_slice(&self.z);
        }
    }
}

impl NonlinearSolver for SimpleSolver {
    fn solve(&mut self, p: &[f64]) -> &[f64] {
        self.eq.set_p(p);
        if self.origin_ok {
            // first-order extrapolation from the origin
            for (d, (a, b)) in self.dp.iter_mut().zip(p.iter().zip(self.origin_p.iter())) {
                *d = a - b;
            }
            gemv(&mut self.extrap, &self.origin_jp, &self.dp);
            self.origin_lin.solve_in_place(&mut self.extrap);
            for (zi, (oz, e)) in self
                .z
                .iter_mut()
                .zip(self.origin_z.iter().zip(self.extrap.iter()))
            {
                *zi = oz - e;
            }
        }
        self.converged = false;
        self.iterations = 0;
        let mut alpha = 1.0f64;
        let mut prev_norm = f64::INFINITY;
        for iter in 0..MAX_ITER {
            self.iterations = iter;
            self.eq.eval(&self.z, &mut self.res, &mut self.jac);
            let norm = inf_norm(&self.res);
            if norm <= self.resabstol {
                self.converged = true;
                break;
            }
            if !norm.is_finite() {
                break;
            }
            if norm < 0.5 * prev_norm {
                alpha = (alpha * DAMPING_GROW).min(1.0);
            } else {
                alpha = (alpha * DAMPING_SHRINK).max(DAMPING_FLOOR);
            }
            prev_norm = norm;
            if !self.lin.setlhs(&self.jac) {
                break;
            }
            self.lin.solve(&mut self.dz, &self.res);
            for (zi, di) in self.z.iter_mut().zip(self.dz.iter()) {
                *zi -= alpha * di;
            }
        }
        if self.converged {
            self.refresh_origin(p);
        }
        &self.z
    }

    fn has_converged(&self) -> bool {
        self.converged
    }

    fn set_origin(&mut self, p: &[f64], z: &[f64]) {
        self.eq.set_p(p);
        self.z.copy_from_slice(z);
        self.eq.eval(&self.z, &mut self.res, &mut self.jac);
        self.refresh_origin(p);
    }

    fn set_resabstol(&mut self, tol: f64) {
        self.resabstol = tol;
    }

    fn origin_distance_sq(&self, p: &[f64]) -> f64 {
        if self.origin_ok {
            dist_sq(p, &self.origin_p)
        } else {
            f64::INFINITY
        }
    }

    fn np(&self) -> usize {
        self.eq.np()
    }

    fn nn(&self) -> usize {
        self.eq.nn()
    }
}
