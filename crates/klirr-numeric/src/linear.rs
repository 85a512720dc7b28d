use faer::Mat;

/// Dense LU factorization with partial pivoting behind a reuse-friendly
/// `setlhs`/`solve` pair.
///
/// All storage is acquired at construction; `setlhs` refactors in place and
/// reports a singular matrix by returning `false` instead of erroring, so a
/// Newton iteration can probe a Jacobian without unwinding. `solve` permits
/// the output to be the right-hand side (in-place solve).
#[derive(Clone)]
pub struct LinearSolver {
    n: usize,
    lu: Vec<f64>, // column-major n×n
    piv: Vec<usize>,
    ok: bool,
}

impl LinearSolver {
    pub fn new(n: usize) -> Self {
        LinearSolver {
            n,
            lu: vec![0.0; n * n],
            piv: vec![0; n],
            ok: false,
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn is_factored(&self) -> bool {
        self.ok
    }

    /// Copy the factorization of another solver of the same size without
    /// allocating.
    pub fn copy_from(&mut self, other: &LinearSolver) {
        debug_assert_eq!(self.n, other.n);
        self.lu.copy_from_slice(&other.lu);
        self.piv.copy_from_slice(&other.piv);
        self.ok = other.ok;
    }

    /// Factor `a`. Returns `false` on a singular matrix, leaving the solver
    /// unusable until the next successful `setlhs`.
    pub fn setlhs(&mut self, a: &Mat<f64>) -> bool {
        let n = self.n;
        debug_assert_eq!(a.nrows(), n);
        debug_assert_eq!(a.ncols(), n);
        for j in 0..n {
            for i in 0..n {
                self.lu[j * n + i] = a[(i, j)];
            }
        }
        for k in 0..n {
            // partial pivot: largest magnitude in column k at or below k
            let mut p = k;
            let mut best = self.lu[k * n + k].abs();
            for i in k + 1..n {
                let v = self.lu[k * n + i].abs();
                if v > best {
                    best = v;
                    p = i;
                }
            }
            if best == 0.0 {
                self.ok = false;
                return false;
            }
            self.piv[k] = p;
            if p != k {
                for j in 0..n {
                    self.lu.swap(j * n + k, j * n + p);
                }
            }
            let pivot = self.lu[k * n + k];
            for i in k + 1..n {
                let m = self.lu[k * n + i] / pivot;
                self.lu[k * n + i] = m;
                if m != 0.0 {
                    for j in k + 1..n {
                        let u = self.lu[j * n + k];
                        self.lu[j * n + i] -= m * u;
                    }
                }
            }
        }
        self.ok = true;
        true
    }

    /// Solve `A·y = x` into `y`. `y` and `x` may be the same buffer via
    /// [`LinearSolver::solve_in_place`]; here they are distinct slices.
    pub fn solve(&self, y: &mut [f64], x: &[f64]) {
        debug_assert_eq!(x.len(), self.n);
        y.copy_from_slice(x);
        self.solve_in_place(y);
    }

    /// Solve `A·y = y` in place.
    pub fn solve_in_place(&self, y: &mut [f64]) {
        debug_assert!(self.ok, "solve before a successful setlhs");
        let n = self.n;
        debug_assert_eq!(y.len(), n);
        // apply row permutation
        for k in 0..n {
            let p = self.piv[k];
            if p != k {
                y.swap(k, p);
            }
        }
        // forward: L has unit diagonal
        for k in 0..n {
            let yk = y[k];
            if yk != 0.0 {
                for i in k + 1..n {
                    y[i] -= self.lu[k * n + i] * yk;
                }
            }
        }
        // backward: U
        for k in (0..n).rev() {
            let mut v = y[k];
            for j in k + 1..n {
                v -= self.lu[j * n + k] * y[j];
            }
            y[k] = v / self.lu[k * n + k];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mat(rows: &[&[f64]]) -> Mat<f64> {
        let mut m = Mat::zeros(rows.len(), rows[0].len());
        for (i, r) in rows.iter().enumerate() {
            for (j, &v) in r.iter().enumerate() {
                m[(i, j)] = v;
            }
        }
        m
    }

    #[test]
    fn solves_a_permuted_system() {
        let a = mat(&[&[0.0, 2.0, 1.0], &[1.0, 0.0, 0.0], &[3.0, 1.0, 4.0]]);
        let mut s = LinearSolver::new(3);
        assert!(s.setlhs(&a));
        let x = [5.0, -1.0, 2.0];
        let mut y = [0.0; 3];
        s.solve(&mut y, &x);
        // check A·y = x
        for i in 0..3 {
            let mut acc = 0.0;
            for j in 0..3 {
                acc += a[(i, j)] * y[j];
            }
            assert!((acc - x[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn in_place_matches_out_of_place() {
        let a = mat(&[&[4.0, 1.0], &[-2.0, 3.0]]);
        let mut s = LinearSolver::new(2);
        assert!(s.setlhs(&a));
        let x = [1.0, 7.0];
        let mut y = [0.0; 2];
        s.solve(&mut y, &x);
        let mut z = x;
        s.solve_in_place(&mut z);
        assert_eq!(y, z);
    }

    #[test]
    fn singular_reports_failure() {
        let a = mat(&[&[1.0, 2.0], &[2.0, 4.0]]);
        let mut s = LinearSolver::new(2);
        assert!(!s.setlhs(&a));
        assert!(!s.is_factored());
    }

    #[test]
    fn refactoring_reuses_storage() {
        let mut s = LinearSolver::new(2);
        assert!(s.setlhs(&mat(&[&[2.0, 0.0], &[0.0, 2.0]])));
        let mut y = [0.0; 2];
        s.solve(&mut y, &[2.0, 4.0]);
        assert_eq!(y, [1.0, 2.0]);
        assert!(s.setlhs(&mat(&[&[1.0, 1.0], &[0.0, 1.0]])));
        s.solve(&mut y, &[3.0, 1.0]);
        assert_eq!(y, [2.0, 1.0]);
    }
}
