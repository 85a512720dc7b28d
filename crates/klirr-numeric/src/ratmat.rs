use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use std::ops::{Index, IndexMut};

/// Dense column-major matrix of arbitrary-precision rationals.
///
/// This is the workhorse of the model compiler: small enough matrices that
/// density does not hurt, while exact arithmetic keeps every rank decision
/// faithful.
#[derive(Clone, PartialEq, Eq)]
pub struct RatMat {
    nrows: usize,
    ncols: usize,
    data: Vec<BigRational>,
}

impl RatMat {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        RatMat {
            nrows,
            ncols,
            data: vec![BigRational::zero(); nrows * ncols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = RatMat::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = BigRational::from_integer(1.into());
        }
        m
    }

    /// Build from row slices; all rows must have equal length.
    pub fn from_rows(rows: &[Vec<BigRational>]) -> Self {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        let mut m = RatMat::zeros(nrows, ncols);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), ncols, "ragged rows");
            for (j, v) in row.iter().enumerate() {
                m[(i, j)] = v.clone();
            }
        }
        m
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(Zero::is_zero)
    }

    pub fn transpose(&self) -> RatMat {
        let mut t = RatMat::zeros(self.ncols, self.nrows);
        for j in 0..self.ncols {
            for i in 0..self.nrows {
                t[(j, i)] = self[(i, j)].clone();
            }
        }
        t
    }

    pub fn mul(&self, rhs: &RatMat) -> RatMat {
        assert_eq!(self.ncols, rhs.nrows, "dimension mismatch in mul");
        let mut out = RatMat::zeros(self.nrows, rhs.ncols);
        for j in 0..rhs.ncols {
            for k in 0..self.ncols {
                let r = &rhs[(k, j)];
                if r.is_zero() {
                    continue;
                }
                for i in 0..self.nrows {
                    let l = &self[(i, k)];
                    if !l.is_zero() {
                        let p = l * r;
                        out[(i, j)] += p;
                    }
                }
            }
        }
        out
    }

    pub fn add(&self, rhs: &RatMat) -> RatMat {
        assert_eq!((self.nrows, self.ncols), (rhs.nrows, rhs.ncols));
        let mut out = self.clone();
        for (a, b) in out.data.iter_mut().zip(rhs.data.iter()) {
            *a += b;
        }
        out
    }

    pub fn sub(&self, rhs: &RatMat) -> RatMat {
        assert_eq!((self.nrows, self.ncols), (rhs.nrows, rhs.ncols));
        let mut out = self.clone();
        for (a, b) in out.data.iter_mut().zip(rhs.data.iter()) {
            *a -= b;
        }
        out
    }

    pub fn hcat(parts: &[&RatMat]) -> RatMat {
        let nrows = parts.first().map_or(0, |m| m.nrows);
        let ncols = parts.iter().map(|m| m.ncols).sum();
        let mut out = RatMat::zeros(nrows, ncols);
        let mut off = 0;
        for part in parts {
            assert_eq!(part.nrows, nrows, "row mismatch in hcat");
            for j in 0..part.ncols {
                for i in 0..nrows {
                    out[(i, off + j)] = part[(i, j)].clone();
                }
            }
            off += part.ncols;
        }
        out
    }

    pub fn vcat(parts: &[&RatMat]) -> RatMat {
        let ncols = parts.first().map_or(0, |m| m.ncols);
        let nrows = parts.iter().map(|m| m.nrows).sum();
        let mut out = RatMat::zeros(nrows, ncols);
        let mut off = 0;
        for part in parts {
            assert_eq!(part.ncols, ncols, "column mismatch in vcat");
            for j in 0..ncols {
                for i in 0..part.nrows {
                    out[(off + i, j)] = part[(i, j)].clone();
                }
            }
            off += part.nrows;
        }
        out
    }

    pub fn block(&self, r0: usize, c0: usize, nrows: usize, ncols: usize) -> RatMat {
        let mut out = RatMat::zeros(nrows, ncols);
        for j in 0..ncols {
            for i in 0..nrows {
                out[(i, j)] = self[(r0 + i, c0 + j)].clone();
            }
        }
        out
    }

    pub fn gather_rows(&self, rows: &[usize]) -> RatMat {
        let mut out = RatMat::zeros(rows.len(), self.ncols);
        for (i, &r) in rows.iter().enumerate() {
            for j in 0..self.ncols {
                out[(i, j)] = self[(r, j)].clone();
            }
        }
        out
    }

    pub fn delete_col(&mut self, col: usize) {
        assert!(col < self.ncols);
        // data is column-major, so a column is contiguous
        let start = col * self.nrows;
        self.data.drain(start..start + self.nrows);
        self.ncols -= 1;
    }

    pub fn delete_row(&mut self, row: usize) {
        assert!(row < self.nrows);
        let mut out = Vec::with_capacity((self.nrows - 1) * self.ncols);
        for j in 0..self.ncols {
            for i in 0..self.nrows {
                if i != row {
                    out.push(self.data[j * self.nrows + i].clone());
                }
            }
        }
        self.data = out;
        self.nrows -= 1;
    }

    pub fn swap_cols(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for i in 0..self.nrows {
            let (x, y) = (a * self.nrows + i, b * self.nrows + i);
            self.data.swap(x, y);
        }
    }

    /// column[dst] -= factor * column[src]
    pub fn col_axpy(&mut self, dst: usize, src: usize, factor: &BigRational) {
        if factor.is_zero() {
            return;
        }
        for i in 0..self.nrows {
            let v = &self.data[src * self.nrows + i] * factor;
            self.data[dst * self.nrows + i] -= v;
        }
    }

    pub fn nnz_col(&self, col: usize) -> usize {
        (0..self.nrows)
            .filter(|&i| !self.data[col * self.nrows + i].is_zero())
            .count()
    }

    /// Position of the entry with the largest absolute value, if any nonzero.
    pub fn argmax_abs(&self) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize, BigRational)> = None;
        for j in 0..self.ncols {
            for i in 0..self.nrows {
                let v = self[(i, j)].abs();
                if v.is_zero() {
                    continue;
                }
                match &best {
                    Some((_, _, bv)) if *bv >= v => {}
                    _ => best = Some((i, j, v)),
                }
            }
        }
        best.map(|(i, j, _)| (i, j))
    }

    pub fn to_f64(&self) -> faer::Mat<f64> {
        let mut out = faer::Mat::zeros(self.nrows, self.ncols);
        for j in 0..self.ncols {
            for i in 0..self.nrows {
                out[(i, j)] = self[(i, j)].to_f64().unwrap_or(f64::NAN);
            }
        }
        out
    }

    /// Squared Frobenius norm evaluated in double precision; used only for
    /// indeterminacy heuristics, never for rank decisions.
    pub fn norm_sq_f64(&self) -> f64 {
        self.data
            .iter()
            .map(|v| {
                let f = v.to_f64().unwrap_or(0.0);
                f * f
            })
            .sum()
    }
}

impl Index<(usize, usize)> for RatMat {
    type Output = BigRational;
    fn index(&self, (i, j): (usize, usize)) -> &BigRational {
        debug_assert!(i < self.nrows && j < self.ncols);
        &self.data[j * self.nrows + i]
    }
}

impl IndexMut<(usize, usize)> for RatMat {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut BigRational {
        debug_assert!(i < self.nrows && j < self.ncols);
        &mut self.data[j * self.nrows + i]
    }
}

impl std::fmt::Debug for RatMat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "RatMat {}x{}", self.nrows, self.ncols)?;
        for i in 0..self.nrows {
            for j in 0..self.ncols {
                write!(f, "{} ", self[(i, j)])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rat, ratio};

    #[test]
    fn mul_and_transpose() {
        let a = RatMat::from_rows(&[vec![rat(1), rat(2)], vec![rat(3), rat(4)]]);
        let b = RatMat::from_rows(&[vec![rat(0), rat(1)], vec![rat(1), rat(0)]]);
        let ab = a.mul(&b);
        assert_eq!(ab[(0, 0)], rat(2));
        assert_eq!(ab[(1, 1)], rat(3));
        assert_eq!(a.transpose()[(0, 1)], rat(3));
    }

    #[test]
    fn delete_and_axpy() {
        let mut m = RatMat::from_rows(&[vec![rat(1), rat(2), rat(3)], vec![rat(4), rat(5), rat(6)]]);
        m.col_axpy(2, 0, &ratio(3, 1));
        assert_eq!(m[(0, 2)], rat(0));
        assert_eq!(m[(1, 2)], rat(-6));
        m.delete_col(1);
        assert_eq!(m.ncols(), 2);
        assert_eq!(m[(1, 1)], rat(-6));
        m.delete_row(0);
        assert_eq!(m.nrows(), 1);
        assert_eq!(m[(0, 0)], rat(4));
    }
}
