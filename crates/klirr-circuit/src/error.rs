use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Element matrices disagree on a dimension or a branch is missing a pin
    #[error("invalid element: {0}")]
    InvalidElement(String),

    // A pin name that does not exist on the referenced element
    #[error("element {element} has no pin named '{pin}'")]
    UnknownPin { element: usize, pin: String },

    // connect() needs something to connect
    #[error("a connection requires at least two pins")]
    EmptyConnection,
}
