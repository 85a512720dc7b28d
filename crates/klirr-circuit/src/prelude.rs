pub use crate::error::Error;
pub type Result<T> = core::result::Result<T, Error>;

pub use crate::element::{Element, ElementBuilder, Nonlinearity, ResidualFn};
pub use klirr_numeric::{RatMat, SpRat, rat, rat_from_f64, ratio};
pub use std::sync::Arc;
