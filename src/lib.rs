//! Keypoint decoding for single-person MoveNet models.

pub mod decode;
pub mod error;
pub mod model;
pub mod pose;
pub mod synthetic;
pub mod tensor_file;

pub use decode::{Decoded, Decoder, Options, Tensors};
pub use error::{Error, ErrorKind};
pub use pose::{Keypoint, KeypointKind, Pose};
