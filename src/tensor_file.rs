//! Raw little-endian `f32` tensor files, as dumped by most inference runtimes.

use crate::error::Error;
use ndarray::Array3;
use std::{convert::TryInto, path::Path};

const F32_SIZE: usize = std::mem::size_of::<f32>();

pub fn read_f32_le<P>(path: P) -> Result<Vec<f32>, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Error::ReadTensor(e, path.to_path_buf()))?;
    if bytes.len() % F32_SIZE != 0 {
        return Err(Error::TensorFileLength(path.to_path_buf(), bytes.len()));
    }
    Ok(bytes
        .chunks_exact(F32_SIZE)
        .filter_map(|chunk| chunk.try_into().ok().map(f32::from_le_bytes))
        .collect())
}

/// Read a row-major tensor of the given shape.
pub fn read_tensor<P>(path: P, shape: (usize, usize, usize)) -> Result<Array3<f32>, Error>
where
    P: AsRef<Path>,
{
    let values = read_f32_le(path)?;
    Array3::from_shape_vec(shape, values)
        .map_err(|e| Error::ConstructArray(e, vec![shape.0, shape.1, shape.2]))
}
