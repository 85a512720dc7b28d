pub mod caching;
pub mod eq;
pub mod homotopy;
pub mod kdtree;
pub mod simple;

pub use caching::CachingSolver;
pub use eq::{ParametricEq, QFunc};
pub use homotopy::HomotopySolver;
pub use kdtree::KdTree;
pub use simple::SimpleSolver;

/// Common contract of the nonlinear solver stack.
///
/// Given a parameter vector `p`, a solver returns a `z` with
/// `res(z, p) = 0` to within its residual tolerance, or its best attempt
/// with [`NonlinearSolver::has_converged`] reporting `false`. Solvers are
/// stateful: the previous solution seeds the next solve, and
/// [`NonlinearSolver::set_origin`] installs an externally known solution
/// pair as the seed and extrapolation anchor.
pub trait NonlinearSolver: Send {
    fn solve(&mut self, p: &[f64]) -> &[f64];
    fn has_converged(&self) -> bool;
    fn set_origin(&mut self, p: &[f64], z: &[f64]);
    fn set_resabstol(&mut self, tol: f64);
    /// Squared distance from `p` to the solver's current extrapolation
    /// origin, infinite when it has none.
    fn origin_distance_sq(&self, p: &[f64]) -> f64 {
        let _ = p;
        f64::INFINITY
    }
    fn np(&self) -> usize;
    fn nn(&self) -> usize;
}

/// Signature of the solver constructors handed to the model compiler:
/// `(equation, initial parameter, initial solution) → boxed solver`.
pub type SolverFactory = dyn Fn(ParametricEq, &[f64], &[f64]) -> Box<dyn NonlinearSolver> + Sync;

/// Plain damped Newton.
pub fn simple_solver(eq: ParametricEq, p0: &[f64], z0: &[f64]) -> Box<dyn NonlinearSolver> {
    let mut s = SimpleSolver::new(eq);
    s.set_origin(p0, z0);
    Box::new(s)
}

/// Homotopy over damped Newton; robust without the memory of a cache.
pub fn homotopy_solver(eq: ParametricEq, p0: &[f64], z0: &[f64]) -> Box<dyn NonlinearSolver> {
    let mut s = HomotopySolver::new(SimpleSolver::new(eq));
    s.set_origin(p0, z0);
    Box::new(s)
}

/// The default runtime stack: homotopy over a caching warm-starter over
/// damped Newton.
pub fn default_solver(eq: ParametricEq, p0: &[f64], z0: &[f64]) -> Box<dyn NonlinearSolver> {
    let mut s = HomotopySolver::new(CachingSolver::new(SimpleSolver::new(eq)));
    s.set_origin(p0, z0);
    Box::new(s)
}

pub(crate) fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0f64, |acc, x| acc.max(x.abs()))
}

pub(crate) fn dist_sq(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}
