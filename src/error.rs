use std::path::PathBuf;

/// Broad classification of [`Error`] values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid construction parameters; the decoder must not be used.
    Config,
    /// A tensor does not have the shape the decoder was built for.
    Shape,
    /// A value could not be converted or compared.
    Numeric,
    /// Reading tensor data from disk failed.
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("feature size must be greater than zero")]
    ZeroFeatureSize,

    #[error("number of joints must be greater than zero")]
    ZeroNumJoints,

    #[error("center delta must be finite and greater than zero, got {0}")]
    InvalidCenterDelta(f32),

    #[error("cannot freeze unknown head: {0}")]
    UnknownHead(String),

    #[error("failed to parse {kind} from {value:?}")]
    ParseOption { kind: &'static str, value: String },

    #[error("{name} tensor has shape {actual:?}, expected {expected:?}")]
    TensorShape {
        name: &'static str,
        expected: [usize; 3],
        actual: Vec<usize>,
    },

    #[error("expected a batch of one for head {0}, got {1}")]
    BatchSize(String, usize),

    #[error("head {0} is missing from the network outputs")]
    MissingHead(&'static str),

    #[error("failed to construct array of shape {1:?}")]
    ConstructArray(#[source] ndarray::ShapeError, Vec<usize>),

    #[error("failed to construct NotNan from f32: {1}")]
    ConstructNotNan(#[source] ordered_float::FloatIsNan, f32),

    #[error("cannot take the maximum of an empty score map")]
    EmptyScores,

    #[error("failed to convert value to f32")]
    ConvertToF32,

    #[error("failed to convert value to usize")]
    ConvertToUSize,

    #[error("failed to read tensor file: {1:?}")]
    ReadTensor(#[source] std::io::Error, PathBuf),

    #[error("tensor file {0:?} has {1} bytes, which is not a whole number of f32 values")]
    TensorFileLength(PathBuf, usize),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroFeatureSize
            | Self::ZeroNumJoints
            | Self::InvalidCenterDelta(_)
            | Self::UnknownHead(_)
            | Self::ParseOption { .. } => ErrorKind::Config,
            Self::TensorShape { .. }
            | Self::BatchSize(..)
            | Self::MissingHead(_)
            | Self::ConstructArray(..) => ErrorKind::Shape,
            Self::ConstructNotNan(..)
            | Self::EmptyScores
            | Self::ConvertToF32
            | Self::ConvertToUSize => ErrorKind::Numeric,
            Self::ReadTensor(..) | Self::TensorFileLength(..) => ErrorKind::Io,
        }
    }
}
