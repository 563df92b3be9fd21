use thiserror::Error;

/// Caller contract violations raised by the accumulators, pair indexing and
/// strided views. None of these are recovered internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrError {
    #[error("column count must be at least 2, received {size}")]
    InvalidSize { size: usize },

    #[error("expected {expected} columns, found {found}")]
    ColumnCountMismatch { expected: usize, found: usize },

    #[error("cannot merge accumulators over {left} and {right} columns")]
    SizeMismatch { left: usize, right: usize },

    #[error("index ({index}) must be in [0,{limit})")]
    IndexOutOfRange { index: usize, limit: usize },

    #[error("stride along {axis} must be non-zero")]
    InvalidStride { axis: &'static str },

    #[error("strided view needs {required} elements but the buffer holds {available}")]
    OutOfBounds { required: usize, available: usize },

    #[error("arguments must have the same length, found len(v1)={left}, len(v2)={right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("cannot parse '{value}' as {target}")]
    Parse { value: String, target: &'static str },
}

pub type Result<T> = std::result::Result<T, CorrError>;
