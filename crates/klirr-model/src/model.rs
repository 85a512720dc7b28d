use crate::assembly::model_matrices;
use crate::decompose::{SubBlock, decompose};
use crate::prelude::*;
use crate::reduce::reduce_pdims;
use faer::Mat;
use klirr_circuit::circuit::Circuit;
use klirr_circuit::element::ResidualFn;
use klirr_solver::simple::DEFAULT_RESABSTOL;
use klirr_solver::{HomotopySolver, NonlinearSolver, ParametricEq, QFunc, SimpleSolver, SolverFactory};
use num_rational::BigRational;
use num_traits::Signed;

#[derive(Clone, Copy, Debug)]
pub struct CompileOptions {
    /// Split the nonlinearity into minimal independent sub-problems.
    pub decompose: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions { decompose: true }
    }
}

/// One element's share of a composite residual.
#[derive(Clone)]
pub(crate) struct ResidualPart {
    pub q_off: usize,
    pub nq: usize,
    pub z_off: usize,
    pub nn: usize,
    pub func: ResidualFn,
}

/// Compose per-element residuals into one q-space callback. Each part
/// writes its rows of `res` and its block of the global `Jq`; off-block
/// entries stay at their initial zeros.
pub(crate) fn make_q_func(parts: &[ResidualPart]) -> QFunc {
    let parts = parts.to_vec();
    let mut bufs: Vec<Vec<f64>> = parts.iter().map(|p| vec![0.0; p.nn * p.nq]).collect();
    Box::new(move |q, res, jq| {
        for (part, buf) in parts.iter().zip(bufs.iter_mut()) {
            (part.func)(
                &q[part.q_off..part.q_off + part.nq],
                &mut res[part.z_off..part.z_off + part.nn],
                buf,
            );
            for r in 0..part.nn {
                for c in 0..part.nq {
                    jq[(part.z_off + r, part.q_off + c)] = buf[r * part.nq + c];
                }
            }
        }
    })
}

pub(crate) fn eye(n: usize) -> Mat<f64> {
    let mut m = Mat::zeros(n, n);
    for i in 0..n {
        m[(i, i)] = 1.0;
    }
    m
}

fn col_to_vec(m: &RatMat) -> Vec<f64> {
    let f = m.to_f64();
    (0..f.nrows()).map(|i| f[(i, 0)]).collect()
}

/// Root of a sub-problem at `q = q_target`, found by homotopy continuation
/// in q-space starting from `q = 0, z = 0` where every element residual
/// vanishes by construction.
pub(crate) fn initial_solution(
    parts: &[ResidualPart],
    fq: &Mat<f64>,
    q_target: &[f64],
    tol: f64,
) -> Result<Vec<f64>> {
    let nq = fq.nrows();
    let nn = fq.ncols();
    let eq = ParametricEq::new(vec![0.0; nq], eye(nq), fq.clone(), make_q_func(parts));
    let mut solver = HomotopySolver::new(SimpleSolver::new(eq));
    solver.set_resabstol(tol);
    solver.set_origin(&vec![0.0; nq], &vec![0.0; nn]);
    let z = solver.solve(q_target).to_vec();
    if solver.has_converged() {
        Ok(z)
    } else {
        Err(Error::InitialSolution)
    }
}

/// One independent block of coupled nonlinear unknowns, compiled and ready
/// to solve per sample.
pub struct SubProblem {
    pub(crate) dq: Mat<f64>,
    pub(crate) eq: Mat<f64>,
    pub(crate) fqprev: Mat<f64>,
    pub(crate) pexp: Mat<f64>,
    pub(crate) fq: Mat<f64>,
    pub(crate) q0: Vec<f64>,
    pub(crate) z_off: usize,
    pub(crate) nn: usize,
    pub(crate) np: usize,
    pub(crate) parts: Vec<ResidualPart>,
    pub(crate) z0: Vec<f64>,
    pub(crate) solver: Box<dyn NonlinearSolver>,
}

impl SubProblem {
    pub fn np(&self) -> usize {
        self.np
    }

    pub fn nn(&self) -> usize {
        self.nn
    }

    pub fn nq(&self) -> usize {
        self.fq.nrows()
    }

    pub fn z_offset(&self) -> usize {
        self.z_off
    }

    pub fn dq(&self) -> &Mat<f64> {
        &self.dq
    }

    pub fn eq(&self) -> &Mat<f64> {
        &self.eq
    }

    pub fn fqprev(&self) -> &Mat<f64> {
        &self.fqprev
    }

    pub fn pexp(&self) -> &Mat<f64> {
        &self.pexp
    }

    pub fn fq(&self) -> &Mat<f64> {
        &self.fq
    }

    pub fn q0(&self) -> &[f64] {
        &self.q0
    }

    pub fn z0(&self) -> &[f64] {
        &self.z0
    }
}

/// The compiled artifact: a fixed-step discrete-time state-space simulator
///
/// ```text
/// x[n+1] = x0 + A·x[n] + B·u[n] + C·z[n]
/// y[n]   = y0 + Dy·x[n] + Ey·u[n] + Fy·z[n]
/// ```
///
/// where `z[n]` stacks the roots of the per-sub-problem nonlinear residuals.
/// Immutable after compilation except for the hidden state vector.
pub struct DiscreteModel {
    pub(crate) nx: usize,
    pub(crate) nu: usize,
    pub(crate) ny: usize,
    pub(crate) nn: usize,
    pub(crate) a: Mat<f64>,
    pub(crate) b: Mat<f64>,
    pub(crate) c: Mat<f64>,
    pub(crate) x0: Vec<f64>,
    pub(crate) dy: Mat<f64>,
    pub(crate) ey: Mat<f64>,
    pub(crate) fy: Mat<f64>,
    pub(crate) y0: Vec<f64>,
    pub(crate) subs: Vec<SubProblem>,
    pub(crate) x: Vec<f64>,
}

impl DiscreteModel {
    /// Compile with the default solver stack
    /// (`Homotopy{Caching{SimpleSolver}}`) at `1/sample_rate` seconds per
    /// step.
    pub fn new(circ: &Circuit, sample_rate: u32) -> Result<Self> {
        compile(
            circ,
            &ratio(1, i64::from(sample_rate)),
            &klirr_solver::default_solver,
            CompileOptions::default(),
        )
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn nu(&self) -> usize {
        self.nu
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn nn(&self) -> usize {
        self.nn
    }

    pub fn a(&self) -> &Mat<f64> {
        &self.a
    }

    pub fn b(&self) -> &Mat<f64> {
        &self.b
    }

    pub fn c(&self) -> &Mat<f64> {
        &self.c
    }

    pub fn x0(&self) -> &[f64] {
        &self.x0
    }

    pub fn dy(&self) -> &Mat<f64> {
        &self.dy
    }

    pub fn ey(&self) -> &Mat<f64> {
        &self.ey
    }

    pub fn fy(&self) -> &Mat<f64> {
        &self.fy
    }

    pub fn y0(&self) -> &[f64] {
        &self.y0
    }

    pub fn subproblems(&self) -> &[SubProblem] {
        &self.subs
    }

    pub fn state(&self) -> &[f64] {
        &self.x
    }

    pub fn set_state(&mut self, x: &[f64]) -> Result<()> {
        if x.len() != self.nx {
            return Err(Error::InputLen {
                expected: self.nx,
                found: x.len(),
            });
        }
        self.x.copy_from_slice(x);
        Ok(())
    }

    pub fn reset_state(&mut self) {
        self.x.fill(0.0);
    }
}

/// Compile a circuit into a [`DiscreteModel`] at sample period `t`.
pub fn compile(
    circ: &Circuit,
    t: &BigRational,
    factory: &SolverFactory,
    opts: CompileOptions,
) -> Result<DiscreteModel> {
    if !t.is_positive() {
        return Err(Error::SamplePeriod);
    }
    log::info!(
        "compiling circuit: {} elements, {} branches, {} states, {} nonlinear unknowns",
        circ.elements.len(),
        circ.nb(),
        circ.nx(),
        circ.nn()
    );
    let mut mats = model_matrices(circ, t)?;
    let mut blocks = decompose(&mut mats, circ, opts.decompose);
    let mut reduced = reduce_pdims(&mut mats, &mut blocks);
    let parts: Vec<Vec<ResidualPart>> = blocks.iter().map(|b| build_parts(circ, b)).collect();
    if !blocks.is_empty() {
        log::info!(
            "nonlinearity decomposed into {} sub-problem(s), parameter dims {:?}",
            blocks.len(),
            reduced.iter().map(|r| r.pexp.ncols()).collect::<Vec<_>>()
        );
    }

    // sub-problems whose parameter space reduced to nothing have a constant
    // solution; mark them, decouple the survivors, and reduce again until
    // every remaining parameter moves
    let mut eliminated: Vec<usize> = Vec::new();
    let mut folds: Vec<Vec<(usize, RatMat)>> = (0..blocks.len()).map(|_| Vec::new()).collect();
    loop {
        let mut changed = false;
        for k in 0..blocks.len() {
            if reduced[k].pexp.ncols() > 0 || eliminated.contains(&k) {
                continue;
            }
            let col_off = blocks[k].col_off;
            let nn_k = blocks[k].nn;
            let mut saves = Vec::new();
            for j in 0..blocks.len() {
                if j == k || eliminated.contains(&j) {
                    continue;
                }
                let fjk = blocks[j].fqprev_full.block(0, col_off, blocks[j].nq, nn_k);
                if !fjk.is_zero() {
                    for jj in 0..nn_k {
                        for i in 0..blocks[j].nq {
                            blocks[j].fqprev_full[(i, col_off + jj)] = rat(0);
                        }
                    }
                    saves.push((j, fjk));
                }
            }
            folds[k] = saves;
            eliminated.push(k);
            changed = true;
        }
        if !changed {
            break;
        }
        reduced = reduce_pdims(&mut mats, &mut blocks);
    }

    // exact arithmetic ends here
    let c_f = mats.c.to_f64();
    let fy_f = mats.fy.to_f64();
    let mut x0f = col_to_vec(&mats.x0);
    let mut y0f = col_to_vec(&mats.y0);
    let mut q0f: Vec<Vec<f64>> = blocks.iter().map(|b| col_to_vec(&b.q0)).collect();

    // fold the constant roots into the affine parts, in elimination order
    for &k in &eliminated {
        let fq_k = blocks[k].fq.to_f64();
        let z = initial_solution(&parts[k], &fq_k, &q0f[k], DEFAULT_RESABSTOL)?;
        let col_off = blocks[k].col_off;
        for (i, x0i) in x0f.iter_mut().enumerate() {
            for (jj, &zv) in z.iter().enumerate() {
                *x0i += c_f[(i, col_off + jj)] * zv;
            }
        }
        for (i, y0i) in y0f.iter_mut().enumerate() {
            for (jj, &zv) in z.iter().enumerate() {
                *y0i += fy_f[(i, col_off + jj)] * zv;
            }
        }
        for (j, fjk) in &folds[k] {
            let fm = fjk.to_f64();
            for i in 0..fm.nrows() {
                for (jj, &zv) in z.iter().enumerate() {
                    q0f[*j][i] += fm[(i, jj)] * zv;
                }
            }
        }
    }

    // final z layout spans the surviving blocks only
    let kept: Vec<usize> = (0..blocks.len()).filter(|k| !eliminated.contains(k)).collect();
    let kept_cols: Vec<usize> = kept
        .iter()
        .flat_map(|&k| blocks[k].col_off..blocks[k].col_off + blocks[k].nn)
        .collect();
    let nn_final = kept_cols.len();
    let gather_cols = |m: &Mat<f64>| -> Mat<f64> {
        let mut out = Mat::zeros(m.nrows(), nn_final);
        for (jj, &col) in kept_cols.iter().enumerate() {
            for i in 0..m.nrows() {
                out[(i, jj)] = m[(i, col)];
            }
        }
        out
    };

    let mut subs = Vec::with_capacity(kept.len());
    let mut z_off = 0usize;
    for &k in &kept {
        let blk: &SubBlock = &blocks[k];
        let rk = &reduced[k];
        let np = rk.pexp.ncols();
        let fq_f = blk.fq.to_f64();
        let z0 = initial_solution(&parts[k], &fq_f, &q0f[k], DEFAULT_RESABSTOL)?;
        let pexp_f = rk.pexp.to_f64();
        let eq_obj = ParametricEq::new(
            q0f[k].clone(),
            pexp_f.clone(),
            fq_f.clone(),
            make_q_func(&parts[k]),
        );
        let solver = factory(eq_obj, &vec![0.0; np], &z0);
        subs.push(SubProblem {
            dq: rk.dq.to_f64(),
            eq: rk.eq.to_f64(),
            fqprev: gather_cols(&rk.fqprev.to_f64()),
            pexp: pexp_f,
            fq: fq_f,
            q0: q0f[k].clone(),
            z_off,
            nn: blk.nn,
            np,
            parts: parts[k].clone(),
            z0,
            solver,
        });
        z_off += blk.nn;
    }

    Ok(DiscreteModel {
        nx: mats.nx,
        nu: mats.nu,
        ny: mats.ny,
        nn: nn_final,
        a: mats.a.to_f64(),
        b: mats.b.to_f64(),
        c: gather_cols(&c_f),
        x0: x0f,
        dy: mats.dy.to_f64(),
        ey: mats.ey.to_f64(),
        fy: gather_cols(&fy_f),
        y0: y0f,
        subs,
        x: vec![0.0; mats.nx],
    })
}

fn build_parts(circ: &Circuit, blk: &SubBlock) -> Vec<ResidualPart> {
    let mut parts = Vec::with_capacity(blk.elems.len());
    let (mut q_off, mut z_off) = (0usize, 0usize);
    for &e in &blk.elems {
        let el = &circ.elements[e];
        let nlin = el
            .nonlinearity
            .as_ref()
            .expect("decomposition blocks cover nonlinear elements only");
        parts.push(ResidualPart {
            q_off,
            nq: el.nq(),
            z_off,
            nn: el.nn(),
            func: nlin.func.clone(),
        });
        q_off += el.nq();
        z_off += el.nn();
    }
    parts
}
