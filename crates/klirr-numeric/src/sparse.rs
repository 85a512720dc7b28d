use crate::ratmat::RatMat;
use num_rational::BigRational;
use num_traits::Zero;

/// Compressed-column sparse matrix over arbitrary-precision rationals.
///
/// Only the operations the model compiler needs are provided: concatenation,
/// block-diagonal stacking, transpose, multiplication, per-row nonzero
/// counts and triplet iteration.
#[derive(Clone, PartialEq, Eq)]
pub struct SpRat {
    nrows: usize,
    ncols: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    vals: Vec<BigRational>,
}

impl SpRat {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        SpRat {
            nrows,
            ncols,
            col_ptr: vec![0; ncols + 1],
            row_idx: Vec::new(),
            vals: Vec::new(),
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut t = Vec::with_capacity(n);
        for i in 0..n {
            t.push((i, i, BigRational::from_integer(1.into())));
        }
        SpRat::from_triplets(n, n, t)
    }

    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        mut triplets: Vec<(usize, usize, BigRational)>,
    ) -> Self {
        triplets.sort_by_key(|&(r, c, _)| (c, r));
        // merge duplicate cells, then drop exact zeros
        let mut merged: Vec<(usize, usize, BigRational)> = Vec::with_capacity(triplets.len());
        for (r, c, v) in triplets {
            assert!(r < nrows && c < ncols, "triplet out of bounds");
            match merged.last_mut() {
                Some((lr, lc, lv)) if *lr == r && *lc == c => *lv += v,
                _ => merged.push((r, c, v)),
            }
        }
        merged.retain(|(_, _, v)| !v.is_zero());

        let mut col_ptr = vec![0usize; ncols + 1];
        let mut row_idx = Vec::with_capacity(merged.len());
        let mut vals = Vec::with_capacity(merged.len());
        for (r, c, v) in merged {
            row_idx.push(r);
            vals.push(v);
            col_ptr[c + 1] += 1;
        }
        for c in 0..ncols {
            col_ptr[c + 1] += col_ptr[c];
        }
        SpRat {
            nrows,
            ncols,
            col_ptr,
            row_idx,
            vals,
        }
    }

    pub fn from_dense(m: &RatMat) -> Self {
        let mut t = Vec::new();
        for j in 0..m.ncols() {
            for i in 0..m.nrows() {
                if !m[(i, j)].is_zero() {
                    t.push((i, j, m[(i, j)].clone()));
                }
            }
        }
        SpRat::from_triplets(m.nrows(), m.ncols(), t)
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.vals.len()
    }

    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, &BigRational)> + '_ {
        (0..self.ncols).flat_map(move |c| {
            (self.col_ptr[c]..self.col_ptr[c + 1]).map(move |k| (self.row_idx[k], c, &self.vals[k]))
        })
    }

    pub fn scale(&self, factor: &BigRational) -> SpRat {
        let t = self
            .triplets()
            .map(|(r, c, v)| (r, c, v * factor))
            .collect();
        SpRat::from_triplets(self.nrows, self.ncols, t)
    }

    pub fn add(&self, rhs: &SpRat) -> SpRat {
        assert_eq!((self.nrows, self.ncols), (rhs.nrows, rhs.ncols));
        let mut t: Vec<_> = self.triplets().map(|(r, c, v)| (r, c, v.clone())).collect();
        t.extend(rhs.triplets().map(|(r, c, v)| (r, c, v.clone())));
        SpRat::from_triplets(self.nrows, self.ncols, t)
    }

    pub fn transpose(&self) -> SpRat {
        let t = self.triplets().map(|(r, c, v)| (c, r, v.clone())).collect();
        SpRat::from_triplets(self.ncols, self.nrows, t)
    }

    pub fn hcat(parts: &[&SpRat]) -> SpRat {
        let nrows = parts.first().map_or(0, |m| m.nrows);
        let ncols = parts.iter().map(|m| m.ncols).sum();
        let mut t = Vec::new();
        let mut off = 0;
        for part in parts {
            assert_eq!(part.nrows, nrows, "row mismatch in hcat");
            t.extend(part.triplets().map(|(r, c, v)| (r, off + c, v.clone())));
            off += part.ncols;
        }
        SpRat::from_triplets(nrows, ncols, t)
    }

    pub fn vcat(parts: &[&SpRat]) -> SpRat {
        let ncols = parts.first().map_or(0, |m| m.ncols);
        let nrows = parts.iter().map(|m| m.nrows).sum();
        let mut t = Vec::new();
        let mut off = 0;
        for part in parts {
            assert_eq!(part.ncols, ncols, "column mismatch in vcat");
            t.extend(part.triplets().map(|(r, c, v)| (off + r, c, v.clone())));
            off += part.nrows;
        }
        SpRat::from_triplets(nrows, ncols, t)
    }

    pub fn block_diag(parts: &[&SpRat]) -> SpRat {
        let nrows = parts.iter().map(|m| m.nrows).sum();
        let ncols = parts.iter().map(|m| m.ncols).sum();
        let mut t = Vec::new();
        let (mut ro, mut co) = (0, 0);
        for part in parts {
            t.extend(part.triplets().map(|(r, c, v)| (ro + r, co + c, v.clone())));
            ro += part.nrows;
            co += part.ncols;
        }
        SpRat::from_triplets(nrows, ncols, t)
    }

    pub fn mul_dense(&self, rhs: &RatMat) -> RatMat {
        assert_eq!(self.ncols, rhs.nrows(), "dimension mismatch in mul_dense");
        let mut out = RatMat::zeros(self.nrows, rhs.ncols());
        for (r, c, v) in self.triplets() {
            for j in 0..rhs.ncols() {
                let x = &rhs[(c, j)];
                if !x.is_zero() {
                    let p = v * x;
                    out[(r, j)] += p;
                }
            }
        }
        out
    }

    pub fn to_dense(&self) -> RatMat {
        let mut out = RatMat::zeros(self.nrows, self.ncols);
        for (r, c, v) in self.triplets() {
            out[(r, c)] = v.clone();
        }
        out
    }

    pub fn nnz_per_row(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.nrows];
        for &r in &self.row_idx {
            counts[r] += 1;
        }
        counts
    }

    /// Row-major adjacency: for each row the (column, value) pairs.
    /// `gensolve` walks rows, which CSC cannot do directly.
    pub fn rows_vec(&self) -> Vec<Vec<(usize, BigRational)>> {
        let mut rows = vec![Vec::new(); self.nrows];
        for (r, c, v) in self.triplets() {
            rows[r].push((c, v.clone()));
        }
        rows
    }
}

impl std::fmt::Debug for SpRat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SpRat {}x{} nnz={}", self.nrows, self.ncols, self.nnz())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rat, ratio};

    #[test]
    fn triplets_sum_duplicates() {
        let m = SpRat::from_triplets(2, 2, vec![(0, 0, rat(1)), (0, 0, rat(2)), (1, 1, rat(3))]);
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.to_dense()[(0, 0)], rat(3));
    }

    #[test]
    fn stacking_and_transpose() {
        let a = SpRat::identity(2);
        let b = SpRat::from_triplets(2, 1, vec![(1, 0, rat(5))]);
        let h = SpRat::hcat(&[&a, &b]);
        assert_eq!((h.nrows(), h.ncols()), (2, 3));
        assert_eq!(h.to_dense()[(1, 2)], rat(5));
        let d = SpRat::block_diag(&[&a, &b]);
        assert_eq!((d.nrows(), d.ncols()), (4, 3));
        assert_eq!(d.transpose().to_dense()[(2, 3)], rat(5));
    }

    #[test]
    fn scaled_add_and_mul() {
        let a = SpRat::identity(2);
        let b = a.scale(&ratio(1, 2));
        let s = a.add(&b);
        let x = RatMat::from_rows(&[vec![rat(2)], vec![rat(4)]]);
        let y = s.mul_dense(&x);
        assert_eq!(y[(0, 0)], rat(3));
        assert_eq!(y[(1, 0)], rat(6));
    }

    #[test]
    fn row_views() {
        let m = SpRat::from_triplets(2, 3, vec![(0, 0, rat(1)), (0, 2, rat(2)), (1, 1, rat(4))]);
        assert_eq!(m.nnz_per_row(), vec![2, 1]);
        let rows = m.rows_vec();
        assert_eq!(rows[0], vec![(0, rat(1)), (2, rat(2))]);
    }
}
