use crate::ratmat::RatMat;
use crate::sparse::SpRat;
use num_rational::BigRational;
use num_traits::{Signed, Zero};

/// Sparsity-preserving pivot threshold: among the nonzero entries of the
/// current row image, any entry within this factor of the largest may be
/// chosen as pivot, and the one whose basis column is sparsest wins.
fn pivot_threshold() -> BigRational {
    BigRational::new(1.into(), 10.into())
}

/// Solve `A·(X + H·k) = B` for all `k`, returning a particular solution `X`
/// and a basis `H` of the homogeneous solution set.
///
/// Rows of `A` are visited in ascending order of nonzero count; rows whose
/// image under the current basis vanishes are redundant and skipped. The
/// arithmetic is exact, so the zero test is exact as well.
pub fn gensolve(a: &SpRat, b: &RatMat) -> (RatMat, RatMat) {
    let n = a.ncols();
    assert_eq!(a.nrows(), b.nrows(), "row mismatch between A and B");
    let mut x = RatMat::zeros(n, b.ncols());
    let mut h = RatMat::identity(n);

    let rows = a.rows_vec();
    let mut order: Vec<usize> = (0..a.nrows()).collect();
    order.sort_by_key(|&i| rows[i].len());

    let thresh = pivot_threshold();
    for &i in &order {
        let row = &rows[i];
        if row.is_empty() && b_row_is_zero(b, i) {
            continue;
        }
        // s = aᵢ·H
        let mut s = vec![BigRational::zero(); h.ncols()];
        for (c, v) in row {
            for (jj, sj) in s.iter_mut().enumerate() {
                let hv = &h[(*c, jj)];
                if !hv.is_zero() {
                    *sj += v * hv;
                }
            }
        }
        let max_abs = s.iter().map(Signed::abs).max().unwrap_or_else(BigRational::zero);
        if max_abs.is_zero() {
            // redundant (or inconsistent) equation
            continue;
        }
        let cutoff = &max_abs * &thresh;
        let j = s
            .iter()
            .enumerate()
            .filter(|(_, sj)| sj.abs() >= cutoff)
            .min_by_key(|&(jj, _)| h.nnz_col(jj))
            .map(|(jj, _)| jj)
            .expect("nonzero row image");
        let sj = s[j].clone();

        // q = H[:,j]
        let q: Vec<BigRational> = (0..n).map(|r| h[(r, j)].clone()).collect();

        // X += q · (bᵢ − aᵢ·X) / sⱼ
        for col in 0..x.ncols() {
            let mut r = b[(i, col)].clone();
            for (c, v) in row {
                let xv = &x[(*c, col)];
                if !xv.is_zero() {
                    r -= v * xv;
                }
            }
            if r.is_zero() {
                continue;
            }
            let w = r / &sj;
            for (rr, qv) in q.iter().enumerate() {
                if !qv.is_zero() {
                    let p = qv * &w;
                    x[(rr, col)] += p;
                }
            }
        }

        // H ← H_{−j} − q·s_{−j}/sⱼ
        for (jj, sjj) in s.iter().enumerate() {
            if jj == j || sjj.is_zero() {
                continue;
            }
            let w = sjj / &sj;
            for (rr, qv) in q.iter().enumerate() {
                if !qv.is_zero() {
                    let p = qv * &w;
                    h[(rr, jj)] -= p;
                }
            }
        }
        h.delete_col(j);
    }
    (x, h)
}

fn b_row_is_zero(b: &RatMat, i: usize) -> bool {
    (0..b.ncols()).all(|j| b[(i, j)].is_zero())
}

/// Basis of the right null space of `A`: the columns `n` with `A·n = 0`.
pub fn nullspace(a: &SpRat) -> RatMat {
    gensolve(a, &RatMat::zeros(a.nrows(), 0)).1
}

/// Factor `A = C·F` with `F` of full row rank. `F` keeps a maximal
/// independent subset of `A`'s rows; `C` re-expresses the dependent ones.
pub fn rank_factorize(a: &RatMat) -> (RatMat, RatMat) {
    let mut c = RatMat::identity(a.nrows());
    let mut f = a.clone();
    // left null space of A: columns n with nᵀ·A = 0
    let mut ns = nullspace(&SpRat::from_dense(&a.transpose()));
    while ns.ncols() > 0 {
        let (i, j) = ns.argmax_abs().expect("null basis column cannot be zero");
        let piv = ns[(i, j)].clone();
        // fold row i of F into the other columns of C
        for i2 in 0..c.ncols() {
            if i2 != i {
                let factor = &ns[(i2, j)] / &piv;
                if !factor.is_zero() {
                    c.col_axpy(i2, i, &factor);
                }
            }
        }
        c.delete_col(i);
        // keep the remaining null directions valid for the reduced F
        for j2 in 0..ns.ncols() {
            if j2 != j {
                let factor = &ns[(i, j2)] / &piv;
                if !factor.is_zero() {
                    ns.col_axpy(j2, j, &factor);
                }
            }
        }
        ns.delete_col(j);
        ns.delete_row(i);
        f.delete_row(i);
    }
    (c, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rat;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_sparse(rng: &mut StdRng, nrows: usize, ncols: usize) -> SpRat {
        let mut t = Vec::new();
        for r in 0..nrows {
            for c in 0..ncols {
                if rng.gen_bool(0.4) {
                    t.push((r, c, rat(rng.gen_range(-5..=5))));
                }
            }
        }
        SpRat::from_triplets(nrows, ncols, t)
    }

    #[test]
    fn gensolve_solves_and_annihilates() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..25 {
            let nrows = rng.gen_range(1..6);
            let ncols = rng.gen_range(1..7);
            let a = random_sparse(&mut rng, nrows, ncols);
            // pick B in the range of A so a solution exists
            let w = RatMat::from_rows(
                &(0..ncols)
                    .map(|_| vec![rat(rng.gen_range(-3..=3)), rat(rng.gen_range(-3..=3))])
                    .collect::<Vec<_>>(),
            );
            let b = a.mul_dense(&w);
            let (x, h) = gensolve(&a, &b);

            // A·X = B
            assert_eq!(a.mul_dense(&x), b);
            // A·H = 0
            assert!(a.mul_dense(&h).is_zero());
            // A·(X + H·k) = B for an arbitrary k
            if h.ncols() > 0 {
                let k = RatMat::from_rows(
                    &(0..h.ncols())
                        .map(|_| vec![rat(rng.gen_range(-3..=3)), rat(rng.gen_range(-3..=3))])
                        .collect::<Vec<_>>(),
                );
                let shifted = x.add(&h.mul(&k));
                assert_eq!(a.mul_dense(&shifted), b);
            }
        }
    }

    #[test]
    fn gensolve_basis_has_full_rank() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..25 {
            let (nr, nc) = (rng.gen_range(1..5), rng.gen_range(1..6));
            let a = random_sparse(&mut rng, nr, nc);
            let h = nullspace(&a);
            if h.ncols() == 0 {
                continue;
            }
            // H has full column rank iff its right null space is trivial
            let hn = nullspace(&SpRat::from_dense(&h));
            assert_eq!(hn.ncols(), 0);
        }
    }

    #[test]
    fn rank_factorize_reconstructs() {
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..25 {
            let (nr, nc) = (rng.gen_range(1..6), rng.gen_range(1..6));
            let a = random_sparse(&mut rng, nr, nc).to_dense();
            let (c, f) = rank_factorize(&a);
            assert_eq!(c.mul(&f), a);
            // F has full row rank: its transpose has trivial null space
            let fn_ = nullspace(&SpRat::from_dense(&f.transpose()));
            assert_eq!(fn_.ncols(), 0);
        }
    }

    #[test]
    fn rank_factorize_rank_one() {
        // [1 2; 2 4] = [1; 2]·[1 2]
        let a = RatMat::from_rows(&[vec![rat(1), rat(2)], vec![rat(2), rat(4)]]);
        let (c, f) = rank_factorize(&a);
        assert_eq!(f.nrows(), 1);
        assert_eq!(c.ncols(), 1);
        assert_eq!(c.mul(&f), a);
    }
}
