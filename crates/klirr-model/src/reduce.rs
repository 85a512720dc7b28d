use crate::assembly::RawMats;
use crate::decompose::SubBlock;
use crate::prelude::*;
use klirr_numeric::{gensolve, rank_factorize};

/// Minimal parameterisation of one sub-problem.
pub(crate) struct ReducedSub {
    pub pexp: RatMat,   // nq_k × np
    pub dq: RatMat,     // np × nx
    pub eq: RatMat,     // np × nu
    pub fqprev: RatMat, // np × Σnn
}

/// Shrink each sub-problem's parameter space to its moving dimensions.
///
/// `[dq|eq|fqprev]_full = pexp·[dq|eq|fqprev]` by rank factorization; the
/// part of `pexp` inside `span(fq)` only translates the solver coordinate
/// `z̃ = z + α·p` with `α = (fqᵀfq)⁻¹fqᵀ·pexp`, so when projecting it out
/// shortens `pexp`, the translation is folded exactly into the state and
/// output maps and into the couplings of later sub-problems. The projected
/// map is also written back into the block's full matrices, which makes a
/// second pass a no-op.
pub(crate) fn reduce_pdims(mats: &mut RawMats, blocks: &mut [SubBlock]) -> Vec<ReducedSub> {
    let (nx, nu) = (mats.nx, mats.nu);
    let nn_total = mats.fq.ncols();
    let mut out: Vec<ReducedSub> = Vec::with_capacity(blocks.len());
    for k in 0..blocks.len() {
        let pmat = RatMat::hcat(&[
            &blocks[k].dq_full,
            &blocks[k].eq_full,
            &blocks[k].fqprev_full,
        ]);
        let (mut pexp, f) = rank_factorize(&pmat);
        let r = pexp.ncols();
        let mut dq = f.block(0, 0, r, nx);
        let mut eq = f.block(0, nx, r, nu);
        let mut fqprev = f.block(0, nx + nu, r, nn_total);

        if r > 0 {
            let fq = blocks[k].fq.clone();
            let fqt = fq.transpose();
            // exact pseudo-inverse; fq has full column rank by construction
            let fq_pinv = gensolve(&SpRat::from_dense(&fqt.mul(&fq)), &fqt).0;
            let alpha = fq_pinv.mul(&pexp);
            let pexp_perp = pexp.sub(&fq.mul(&alpha));
            let (pexp2, g) = rank_factorize(&pexp_perp);
            if pexp2.ncols() < r {
                let col_off = blocks[k].col_off;
                let nn_k = blocks[k].nn;
                let ca = mats.c.block(0, col_off, mats.c.nrows(), nn_k).mul(&alpha);
                let fya = mats.fy.block(0, col_off, mats.fy.nrows(), nn_k).mul(&alpha);
                mats.a = mats.a.sub(&ca.mul(&dq));
                mats.b = mats.b.sub(&ca.mul(&eq));
                mats.c = mats.c.sub(&ca.mul(&fqprev));
                mats.dy = mats.dy.sub(&fya.mul(&dq));
                mats.ey = mats.ey.sub(&fya.mul(&eq));
                mats.fy = mats.fy.sub(&fya.mul(&fqprev));
                for j in k + 1..blocks.len() {
                    let fjk = blocks[j]
                        .fqprev_full
                        .block(0, col_off, blocks[j].nq, nn_k)
                        .mul(&alpha);
                    blocks[j].dq_full = blocks[j].dq_full.sub(&fjk.mul(&dq));
                    blocks[j].eq_full = blocks[j].eq_full.sub(&fjk.mul(&eq));
                    blocks[j].fqprev_full = blocks[j].fqprev_full.sub(&fjk.mul(&fqprev));
                }
                // write the projected map back so the reduction is idempotent
                let fqa = fq.mul(&alpha);
                blocks[k].dq_full = blocks[k].dq_full.sub(&fqa.mul(&dq));
                blocks[k].eq_full = blocks[k].eq_full.sub(&fqa.mul(&eq));
                blocks[k].fqprev_full = blocks[k].fqprev_full.sub(&fqa.mul(&fqprev));
                dq = g.mul(&dq);
                eq = g.mul(&eq);
                fqprev = g.mul(&fqprev);
                pexp = pexp2;
            }
        }
        out.push(ReducedSub {
            pexp,
            dq,
            eq,
            fqprev,
        });
    }
    out
}
