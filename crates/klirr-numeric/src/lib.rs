pub mod gensolve;
pub mod linear;
pub mod ratmat;
pub mod sparse;

pub use gensolve::{gensolve, nullspace, rank_factorize};
pub use linear::LinearSolver;
pub use ratmat::RatMat;
pub use sparse::SpRat;

use num_bigint::BigInt;
use num_rational::BigRational;

/// Rational from an integer.
pub fn rat(n: i64) -> BigRational {
    BigRational::from_integer(BigInt::from(n))
}

/// Rational from a numerator/denominator pair.
pub fn ratio(n: i64, d: i64) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(d))
}

/// Exact rational representation of a finite double. Every finite `f64` is a
/// dyadic rational, so this never loses information.
pub fn rat_from_f64(v: f64) -> BigRational {
    BigRational::from_float(v).expect("finite value required")
}

/// y = a·x (dense column-major matrix times slice).
pub fn gemv(y: &mut [f64], a: &faer::Mat<f64>, x: &[f64]) {
    y.fill(0.0);
    gemv_acc(y, a, x);
}

/// y += a·x, no allocation.
pub fn gemv_acc(y: &mut [f64], a: &faer::Mat<f64>, x: &[f64]) {
    debug_assert_eq!(a.nrows(), y.len());
    debug_assert_eq!(a.ncols(), x.len());
    for (j, &xj) in x.iter().enumerate() {
        if xj == 0.0 {
            continue;
        }
        for i in 0..a.nrows() {
            y[i] += a[(i, j)] * xj;
        }
    }
}

/// c = a·b for small dense matrices, written into a preallocated output.
pub fn gemm(c: &mut faer::Mat<f64>, a: &faer::Mat<f64>, b: &faer::Mat<f64>) {
    debug_assert_eq!(c.nrows(), a.nrows());
    debug_assert_eq!(c.ncols(), b.ncols());
    debug_assert_eq!(a.ncols(), b.nrows());
    for j in 0..c.ncols() {
        for i in 0..c.nrows() {
            c[(i, j)] = 0.0;
        }
        for k in 0..a.ncols() {
            let bkj = b[(k, j)];
            if bkj == 0.0 {
                continue;
            }
            for i in 0..a.nrows() {
                c[(i, j)] += a[(i, k)] * bkj;
            }
        }
    }
}
