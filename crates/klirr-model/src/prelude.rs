pub use crate::error::Error;
pub type Result<T> = core::result::Result<T, Error>;

pub use klirr_numeric::{RatMat, SpRat, gemv, gemv_acc, rat, ratio};
