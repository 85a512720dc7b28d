use crate::model::{DiscreteModel, initial_solution};
use crate::prelude::*;
use faer::Mat;
use faer::prelude::Solve;

const STEADY_RESABSTOL: f64 = 1e-15;
const SWEEP_TOL: f64 = 1e-12;
const MAX_SWEEPS: usize = 32;

/// Find the fixed point `(x*, z*)` of the state update under a constant
/// input, i.e. `(I−A)·x* = B·u + C·z* + x0` with every sub-problem residual
/// at zero.
///
/// `(I−A)` is factored once; folding the state through `(I−A)⁻¹·C` turns
/// each sub-problem into a nonlinear equation parameterised by the full `z`
/// vector, with the own-block coupling absorbed into its `fq`. Blocks are
/// solved in order and the sweep repeats until `z` stops moving; with a
/// single sub-problem the first sweep is exact and the second merely
/// confirms it.
pub fn steadystate(model: &DiscreteModel, u: &[f64]) -> Result<Vec<f64>> {
    let nx = model.nx();
    let nn = model.nn();
    if u.len() != model.nu() {
        return Err(Error::InputLen {
            expected: model.nu(),
            found: u.len(),
        });
    }

    let mut ia = Mat::zeros(nx, nx);
    for j in 0..nx {
        for i in 0..nx {
            ia[(i, j)] = (if i == j { 1.0 } else { 0.0 }) - model.a()[(i, j)];
        }
    }
    let lu = ia.full_piv_lu();

    // xi = (I−A)⁻¹·(B·u + x0), m = (I−A)⁻¹·C
    let mut rhs = Mat::zeros(nx, 1);
    for i in 0..nx {
        let mut acc = model.x0()[i];
        for (j, &uj) in u.iter().enumerate() {
            acc += model.b()[(i, j)] * uj;
        }
        rhs[(i, 0)] = acc;
    }
    let xi = lu.solve(&rhs);
    let m = lu.solve(model.c());

    let mut zs = vec![0.0; nn];
    for sub in model.subproblems() {
        zs[sub.z_offset()..sub.z_offset() + sub.nn()].copy_from_slice(sub.z0());
    }

    for _sweep in 0..MAX_SWEEPS {
        let mut delta = 0.0f64;
        for k in 0..model.subproblems().len() {
            let sub = &model.subproblems()[k];
            let (np, nq, nn_k, off) = (sub.np(), sub.nq(), sub.nn(), sub.z_offset());

            // P = pexp·(dq·m + fqprev): how the full z vector reaches q
            let mut inner = Mat::zeros(np, nn);
            for j in 0..nn {
                for r in 0..np {
                    let mut acc = sub.fqprev()[(r, j)];
                    for i in 0..nx {
                        acc += sub.dq()[(r, i)] * m[(i, j)];
                    }
                    inner[(r, j)] = acc;
                }
            }
            let mut p_full = Mat::zeros(nq, nn);
            for j in 0..nn {
                for i in 0..nq {
                    let mut acc = 0.0;
                    for r in 0..np {
                        acc += sub.pexp()[(i, r)] * inner[(r, j)];
                    }
                    p_full[(i, j)] = acc;
                }
            }

            // constant part: q0 + pexp·(dq·xi + eq·u)
            let mut q_target = sub.q0().to_vec();
            for i in 0..nq {
                for r in 0..np {
                    let mut t = 0.0;
                    for ix in 0..nx {
                        t += sub.dq()[(r, ix)] * xi[(ix, 0)];
                    }
                    for (ju, &uj) in u.iter().enumerate() {
                        t += sub.eq()[(r, ju)] * uj;
                    }
                    q_target[i] += sub.pexp()[(i, r)] * t;
                }
            }
            // other blocks' z at their current sweep values
            for j in 0..nn {
                if j < off || j >= off + nn_k {
                    for (i, qt) in q_target.iter_mut().enumerate() {
                        *qt += p_full[(i, j)] * zs[j];
                    }
                }
            }
            // own-block feedback moves into fq
            let mut fq_st = sub.fq().clone();
            for j in 0..nn_k {
                for i in 0..nq {
                    fq_st[(i, j)] += p_full[(i, off + j)];
                }
            }

            let z_k = initial_solution(&sub.parts, &fq_st, &q_target, STEADY_RESABSTOL)
                .map_err(|_| Error::SteadyState)?;
            for (j, &zv) in z_k.iter().enumerate() {
                delta = delta.max((zv - zs[off + j]).abs());
                zs[off + j] = zv;
            }
        }
        if delta < SWEEP_TOL {
            break;
        }
    }

    // back-solve x* = xi + m·z*
    let mut xstar = vec![0.0; nx];
    for i in 0..nx {
        let mut acc = xi[(i, 0)];
        for (j, &zv) in zs.iter().enumerate() {
            acc += m[(i, j)] * zv;
        }
        xstar[i] = acc;
    }
    Ok(xstar)
}

/// [`steadystate`] that additionally installs `x*` as the model state.
pub fn steadystate_install(model: &mut DiscreteModel, u: &[f64]) -> Result<Vec<f64>> {
    let x = steadystate(model, u)?;
    model.set_state(&x)?;
    Ok(x)
}
