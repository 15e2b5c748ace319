use crate::error::Error;
use ndarray::{Array2, Array3};
use num_traits::cast::ToPrimitive;

fn to_f32(value: usize) -> Result<f32, Error> {
    value.to_f32().ok_or(Error::ConvertToF32)
}

/// Inverse distance of every cell to the middle of the grid, smoothed by `delta`.
///
/// The middle sits at `size / 2` on both axes, so for even sizes the
/// heaviest cell is `(size / 2, size / 2)`.
pub(crate) fn center_weight_map(size: usize, delta: f32) -> Result<Array2<f32>, Error> {
    let middle = to_f32(size)? / 2.0;
    let mut weights = Array2::zeros((size, size));
    for ((y, x), weight) in weights.indexed_iter_mut() {
        let dy = to_f32(y)? - middle;
        let dx = to_f32(x)? - middle;
        *weight = ((dy * dy + dx * dx).sqrt() + delta).recip();
    }
    Ok(weights)
}

/// Row and column index of every cell, shaped `size x size x 1` so they
/// broadcast against a `1 x 1 x K` array of joint coordinates.
pub(crate) fn distance_maps(size: usize) -> Result<(Array3<f32>, Array3<f32>), Error> {
    let mut dist_y = Array3::zeros((size, size, 1));
    let mut dist_x = Array3::zeros((size, size, 1));
    for ((y, x, _), value) in dist_y.indexed_iter_mut() {
        *value = to_f32(y)?;
        dist_x[(y, x, 0)] = to_f32(x)?;
    }
    Ok((dist_y, dist_x))
}

#[cfg(test)]
mod tests {
    use super::{center_weight_map, distance_maps};
    use assert_approx_eq::assert_approx_eq;

    mod center_weight_map_tests {
        use super::*;

        #[test]
        fn heaviest_cell_is_the_middle() {
            let weights = center_weight_map(48, 1.8).unwrap();
            assert_approx_eq!(weights[(24, 24)], 1.0 / 1.8);
            assert!(weights.iter().all(|&w| w <= weights[(24, 24)]));
        }

        #[test]
        fn corner_weight() {
            let weights = center_weight_map(4, 1.8).unwrap();
            // (0, 0) is sqrt(8) away from (2, 2).
            assert_approx_eq!(weights[(0, 0)], 1.0 / (8.0_f32.sqrt() + 1.8));
            assert_approx_eq!(weights[(3, 3)], 1.0 / (2.0_f32.sqrt() + 1.8));
        }

        #[test]
        fn same_size_gives_same_map() {
            assert_eq!(
                center_weight_map(64, 1.8).unwrap(),
                center_weight_map(64, 1.8).unwrap()
            );
        }
    }

    mod distance_maps_tests {
        use super::*;

        #[test]
        fn holds_cell_coordinates() {
            let (dist_y, dist_x) = distance_maps(5).unwrap();
            assert_eq!(dist_y.dim(), (5, 5, 1));
            assert_eq!(dist_x.dim(), (5, 5, 1));
            assert_approx_eq!(dist_y[(3, 1, 0)], 3.0);
            assert_approx_eq!(dist_x[(3, 1, 0)], 1.0);
            assert_approx_eq!(dist_y[(0, 4, 0)], 0.0);
            assert_approx_eq!(dist_x[(0, 4, 0)], 4.0);
        }
    }
}
