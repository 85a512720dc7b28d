mod assembly;
mod decompose;
pub mod error;
pub mod model;
pub mod prelude;
mod reduce;
pub mod runner;
pub mod steady;

pub use error::Error;
pub use model::{CompileOptions, DiscreteModel, SubProblem, compile};
pub use runner::ModelRunner;
pub use steady::{steadystate, steadystate_install};
