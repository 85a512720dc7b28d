use crate::assembly::RawMats;
use crate::prelude::*;
use klirr_circuit::circuit::Circuit;
use num_traits::Zero;

/// One block of coupled nonlinear unknowns after decomposition.
pub(crate) struct SubBlock {
    /// Element indices covered by this block, in circuit order.
    pub elems: Vec<usize>,
    /// Column offset of the block's `z` coordinates.
    pub col_off: usize,
    pub nn: usize,
    pub nq: usize,
    /// Global q-row indices of the covered elements.
    pub q_rows: Vec<usize>,
    /// Diagonal piece: couples the block's own unknowns.
    pub fq: RatMat,
    /// Below-diagonal pieces, full `Σnn` width with nonzero columns only
    /// for earlier blocks.
    pub fqprev_full: RatMat,
    pub dq_full: RatMat,
    pub eq_full: RatMat,
    pub q0: RatMat,
}

/// Split the nonlinear coupling into independently solvable blocks.
///
/// Subsets of the remaining nonlinear elements are tried in increasing size;
/// a subset is accepted when an invertible column transform confines its
/// q-rows to the leading remaining columns with full column rank
/// (`tryextract`). The accumulated transform is applied to `C` and `Fy`,
/// which address the same column space.
pub(crate) fn decompose(mats: &mut RawMats, circ: &Circuit, enabled: bool) -> Vec<SubBlock> {
    let nn_total = mats.fq.ncols();
    let q_offs = circ.q_offsets();
    let nns: Vec<usize> = circ.elements.iter().map(|e| e.nn()).collect();
    let nonlinear: Vec<usize> = (0..circ.elements.len()).filter(|&e| nns[e] > 0).collect();

    let q_rows_of = |subset: &[usize]| -> Vec<usize> {
        let mut rows = Vec::new();
        for &e in subset {
            rows.extend(q_offs[e]..q_offs[e] + circ.elements[e].nq());
        }
        rows
    };

    let mut fqw = mats.fq.clone();
    let mut acc = RatMat::identity(nn_total);
    let mut accepted: Vec<Vec<usize>> = Vec::new();
    let mut rem_start = 0usize;

    if enabled {
        let mut remaining = nonlinear.clone();
        while !remaining.is_empty() {
            let subset = find_extractable(&mut fqw, &mut acc, rem_start, &remaining, &nns, &q_rows_of);
            let nn_s: usize = subset.iter().map(|&e| nns[e]).sum();
            remaining.retain(|e| !subset.contains(e));
            accepted.push(subset);
            rem_start += nn_s;
        }
    } else if !nonlinear.is_empty() {
        accepted.push(nonlinear.clone());
    }

    // C and Fy address the transformed column space
    mats.c = mats.c.mul(&acc);
    mats.fy = mats.fy.mul(&acc);
    mats.fq = fqw.clone();

    let mut blocks = Vec::with_capacity(accepted.len());
    let mut col_off = 0usize;
    for subset in accepted {
        let nn: usize = subset.iter().map(|&e| nns[e]).sum();
        let q_rows = q_rows_of(&subset);
        let sub_rows = fqw.gather_rows(&q_rows);
        let fq = sub_rows.block(0, col_off, q_rows.len(), nn);
        let mut fqprev_full = RatMat::zeros(q_rows.len(), nn_total);
        for j in 0..col_off {
            for i in 0..q_rows.len() {
                fqprev_full[(i, j)] = sub_rows[(i, j)].clone();
            }
        }
        // later blocks must not couple back; extraction guarantees it
        debug_assert!((col_off + nn..nn_total)
            .all(|j| (0..q_rows.len()).all(|i| sub_rows[(i, j)].is_zero())));
        blocks.push(SubBlock {
            nq: q_rows.len(),
            dq_full: mats.dq_full.gather_rows(&q_rows),
            eq_full: mats.eq_full.gather_rows(&q_rows),
            q0: mats.q0.gather_rows(&q_rows),
            elems: subset,
            col_off,
            nn,
            q_rows,
            fq,
            fqprev_full,
        });
        col_off += nn;
    }
    blocks
}

/// Search subsets of `remaining` in increasing size for one whose rows can
/// be confined to the leading remaining columns; apply the found transform
/// and return the subset. The full remaining set always succeeds, so this
/// cannot fail.
fn find_extractable(
    fqw: &mut RatMat,
    acc: &mut RatMat,
    rem_start: usize,
    remaining: &[usize],
    nns: &[usize],
    q_rows_of: &impl Fn(&[usize]) -> Vec<usize>,
) -> Vec<usize> {
    let rem_cols = fqw.ncols() - rem_start;
    for size in 1..=remaining.len() {
        for subset in combinations(remaining, size) {
            let nn_s: usize = subset.iter().map(|&e| nns[e]).sum();
            if nn_s > rem_cols {
                continue;
            }
            let rows = q_rows_of(&subset);
            let sub = fqw
                .gather_rows(&rows)
                .block(0, rem_start, rows.len(), rem_cols);
            if let Some(t) = tryextract(&sub, nn_s) {
                apply_right(fqw, rem_start, &t);
                apply_right(acc, rem_start, &t);
                return subset;
            }
        }
    }
    unreachable!("the full remaining subset is always extractable");
}

/// Gauss-Jordan column elimination: find an invertible `T` with
/// `M·T = [B 0]` where `B` spans the leading `numcols` columns with full
/// column rank. `None` when the rank is not exactly `numcols`.
fn tryextract(m: &RatMat, numcols: usize) -> Option<RatMat> {
    let w = m.ncols();
    if w == numcols {
        return Some(RatMat::identity(w));
    }
    let mut t = m.clone();
    let mut a = RatMat::identity(w);
    let mut piv = 0usize;
    for row in 0..t.nrows() {
        let Some(j) = (piv..w).find(|&j| !t[(row, j)].is_zero()) else {
            continue;
        };
        if piv == numcols {
            // more independent columns than the subset owns
            return None;
        }
        t.swap_cols(j, piv);
        a.swap_cols(j, piv);
        for j2 in 0..w {
            if j2 != piv && !t[(row, j2)].is_zero() {
                let factor = &t[(row, j2)] / &t[(row, piv)];
                t.col_axpy(j2, piv, &factor);
                a.col_axpy(j2, piv, &factor);
            }
        }
        piv += 1;
    }
    (piv == numcols).then_some(a)
}

/// `m[:, off..] ← m[:, off..]·t`
fn apply_right(m: &mut RatMat, off: usize, t: &RatMat) {
    let sub = m.block(0, off, m.nrows(), m.ncols() - off);
    let new = sub.mul(t);
    for j in 0..new.ncols() {
        for i in 0..new.nrows() {
            m[(i, off + j)] = new[(i, j)].clone();
        }
    }
}

fn combinations(pool: &[usize], k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut buf = Vec::with_capacity(k);
    fn rec(pool: &[usize], k: usize, start: usize, buf: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if buf.len() == k {
            out.push(buf.clone());
            return;
        }
        for i in start..pool.len() {
            buf.push(pool[i]);
            rec(pool, k, i + 1, buf, out);
            buf.pop();
        }
    }
    rec(pool, k, 0, &mut buf, &mut out);
    out
}
