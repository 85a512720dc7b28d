use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Runner I/O shape mismatches
    #[error("input matrix must have {expected} rows, got {found}")]
    InputRows { expected: usize, found: usize },

    #[error("output matrix must be {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    OutputShape {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    #[error("input vector must have {expected} entries, got {found}")]
    InputLen { expected: usize, found: usize },

    #[error("sample period must be positive")]
    SamplePeriod,

    // The free directions of the solution could not be reconciled with the
    // per-element nonlinear unknowns
    #[error("circuit is structurally indeterminate: {0}")]
    Indeterminate(String),

    // Fatal at compile time: homotopy from q = 0 found no root
    #[error("no initial solution found for a nonlinear sub-problem")]
    InitialSolution,

    // Fatal at run time
    #[error("nonlinear solver produced a non-finite value at sample {sample}")]
    NonFinite { sample: usize },

    #[error("steady-state solve did not converge")]
    SteadyState,
}
