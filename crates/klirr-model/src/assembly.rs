use crate::prelude::*;
use klirr_circuit::circuit::Circuit;
use klirr_numeric::{gensolve, nullspace};
use num_rational::BigRational;
use num_traits::One;

/// Indeterminacy detection threshold on the squared norm of the nullspace
/// image; see the compile-time warning policy.
const INDETERMINACY_TOL: f64 = 1e-20;

/// Everything the later pipeline stages consume, in exact arithmetic.
pub(crate) struct RawMats {
    pub nb: usize,
    pub nx: usize,
    pub nu: usize,
    pub ny: usize,
    pub nq: usize,
    pub a: RatMat,
    pub b: RatMat,
    pub c: RatMat,
    pub x0: RatMat,
    pub dy: RatMat,
    pub ey: RatMat,
    pub fy: RatMat,
    pub y0: RatMat,
    pub dq_full: RatMat,
    pub eq_full: RatMat,
    pub q0: RatMat,
    pub fq: RatMat,
}

/// Assemble the discrete-time model matrices for a circuit at sample period
/// `t` by solving the combined constitutive/topological system
///
/// ```text
/// [ Mv  Mi  Mẋ/T + Mx/2  Mq ]            [ u0  Mu  Mẋ/T − Mx/2 ]
/// [ Tv  0   0            0  ] · X+H·k  = [ 0   0   0           ]
/// [ 0   Ti  0            0  ]            [ 0   0   0           ]
/// ```
///
/// with the trapezoidal rule folded into the `Mẋ/T ± Mx/2` pattern.
pub(crate) fn model_matrices(circ: &Circuit, t: &BigRational) -> Result<RawMats> {
    let (nb, nx, nu, ny, nq) = (circ.nb(), circ.nx(), circ.nu(), circ.ny(), circ.nq());
    let inv_t = t.recip();
    let half = ratio(1, 2);

    let (tv, ti) = circ.topomat();
    let mxd_t = circ.mxd().scale(&inv_t);
    let mx_half = circ.mx().scale(&half);

    let lhs = SpRat::vcat(&[
        &SpRat::hcat(&[&circ.mv(), &circ.mi(), &mxd_t.add(&mx_half), &circ.mq()]),
        &SpRat::hcat(&[
            &tv,
            &SpRat::zeros(tv.nrows(), nb),
            &SpRat::zeros(tv.nrows(), nx),
            &SpRat::zeros(tv.nrows(), nq),
        ]),
        &SpRat::hcat(&[
            &SpRat::zeros(ti.nrows(), nb),
            &ti,
            &SpRat::zeros(ti.nrows(), nx),
            &SpRat::zeros(ti.nrows(), nq),
        ]),
    ]);
    let rhs_top = SpRat::hcat(&[
        &circ.u0(),
        &circ.mu(),
        &mxd_t.add(&mx_half.scale(&-BigRational::one())),
    ]);
    let rhs = SpRat::vcat(&[&rhs_top, &SpRat::zeros(nb, 1 + nu + nx)]).to_dense();

    let (x, f) = gensolve(&lhs, &rhs);

    let v0 = x.block(0, 0, nb, 1);
    let ev = x.block(0, 1, nb, nu);
    let dv = x.block(0, 1 + nu, nb, nx);
    let i0 = x.block(nb, 0, nb, 1);
    let ei = x.block(nb, 1, nb, nu);
    let di = x.block(nb, 1 + nu, nb, nx);
    let x0 = x.block(2 * nb, 0, nx, 1);
    let b = x.block(2 * nb, 1, nx, nu);
    let a = x.block(2 * nb, 1 + nu, nx, nx);
    let q0 = x.block(2 * nb + nx, 0, nq, 1);
    let eq_full = x.block(2 * nb + nx, 1, nq, nu);
    let dq_full = x.block(2 * nb + nx, 1 + nu, nq, nx);

    let mut c = f.block(2 * nb, 0, nx, f.ncols());
    let mut fq = f.block(2 * nb + nx, 0, nq, f.ncols());

    // output matrices: y = P·[v; i; x'; q] plus the direct x[n] share of the
    // trapezoidal averages
    let p = SpRat::hcat(&[
        &circ.pv(),
        &circ.pi(),
        &circ.px().scale(&half).add(&circ.pxd().scale(&inv_t)),
        &circ.pq(),
    ]);
    let px_dir = circ
        .px()
        .scale(&half)
        .add(&circ.pxd().scale(&(-inv_t.clone())))
        .to_dense();
    let dy = p
        .mul_dense(&RatMat::vcat(&[&dv, &di, &a, &dq_full]))
        .add(&px_dir);
    let ey = p.mul_dense(&RatMat::vcat(&[&ev, &ei, &b, &eq_full]));
    let mut fy = p.mul_dense(&f);
    let y0 = p.mul_dense(&RatMat::vcat(&[&v0, &i0, &x0, &q0]));

    // remove solution-space directions that the nonlinear ports cannot see
    let mut ns = nullspace(&SpRat::from_dense(&fq));
    if ns.ncols() > 0 {
        if c.mul(&ns).norm_sq_f64() > INDETERMINACY_TOL {
            log::warn!("state update depends on an indeterminate quantity");
        }
        if fy.mul(&ns).norm_sq_f64() > INDETERMINACY_TOL {
            log::warn!("output depends on an indeterminate quantity");
        }
        while ns.ncols() > 0 {
            let (i, j) = ns.argmax_abs().expect("null basis column cannot be zero");
            let piv = ns[(i, j)].clone();
            for j2 in 0..ns.ncols() {
                if j2 != j {
                    let factor = &ns[(i, j2)] / &piv;
                    ns.col_axpy(j2, j, &factor);
                }
            }
            ns.delete_col(j);
            ns.delete_row(i);
            c.delete_col(i);
            fy.delete_col(i);
            fq.delete_col(i);
        }
    }
    if fq.ncols() != circ.nn() {
        return Err(Error::Indeterminate(format!(
            "{} free directions for {} nonlinear unknowns",
            fq.ncols(),
            circ.nn()
        )));
    }

    Ok(RawMats {
        nb,
        nx,
        nu,
        ny,
        nq,
        a,
        b,
        c,
        x0,
        dy,
        ey,
        fy,
        y0,
        dq_full,
        eq_full,
        q0,
        fq,
    })
}
