pub mod circuit;
pub mod constants;
pub mod element;
pub mod elements;
pub mod error;
pub mod prelude;
