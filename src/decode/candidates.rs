use crate::{
    decode::grid::{Cell, Grid},
    error::Error,
};
use ndarray::ArrayView2;
use ordered_float::NotNan;

/// Number of best cells searched for a second candidate.
pub(crate) const SECOND_CANDIDATE_POOL: usize = 5;

fn not_nan(value: f32) -> Result<NotNan<f32>, Error> {
    NotNan::new(value).map_err(|e| Error::ConstructNotNan(e, value))
}

/// Flattened index of the largest score, scanning rows first.
///
/// Ties go to the first cell in scan order.
pub(crate) fn argmax(scores: ArrayView2<f32>) -> Result<usize, Error> {
    let width = scores.ncols();
    let mut best: Option<(usize, NotNan<f32>)> = None;
    for ((row, col), &score) in scores.indexed_iter() {
        let score = not_nan(score)?;
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((row * width + col, score)),
        }
    }
    best.map(|(index, _)| index).ok_or(Error::EmptyScores)
}

/// Flattened indices of the `k` largest scores in decreasing order.
///
/// The sort is stable, so equal scores keep their scan order and the first
/// element always agrees with [`argmax`].
pub(crate) fn top_k(scores: ArrayView2<f32>, k: usize) -> Result<Vec<usize>, Error> {
    let width = scores.ncols();
    let mut ranked = scores
        .indexed_iter()
        .map(|((row, col), &score)| Ok((row * width + col, not_nan(score)?)))
        .collect::<Result<Vec<_>, Error>>()?;
    ranked.sort_by_key(|&(_, score)| std::cmp::Reverse(score));
    Ok(ranked.into_iter().take(k).map(|(index, _)| index).collect())
}

/// First ranked index lying more than one cell away from `top`.
///
/// `ranked` is expected to start with `top` itself.
pub(crate) fn second_candidate(grid: Grid, top: usize, ranked: &[usize]) -> Option<usize> {
    let top_cell: Cell = grid.cell(top);
    ranked
        .iter()
        .copied()
        .find(|&index| grid.cell(index).chebyshev_distance(top_cell) > 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    mod argmax_tests {
        use super::*;

        #[test]
        fn picks_largest() {
            let scores = array![[0.1, 0.2], [0.9, 0.3]];
            assert_eq!(argmax(scores.view()).unwrap(), 2);
        }

        #[test]
        fn ties_go_to_first_in_scan_order() {
            let scores = array![[0.0, 0.7], [0.7, 0.7]];
            assert_eq!(argmax(scores.view()).unwrap(), 1);
        }

        #[test]
        fn constant_map_gives_zero() {
            let scores = Array2::<f32>::from_elem((6, 6), 0.5);
            assert_eq!(argmax(scores.view()).unwrap(), 0);
        }

        #[test]
        fn nan_is_an_error() {
            let scores = array![[0.0, f32::NAN]];
            assert!(argmax(scores.view()).is_err());
        }

        #[test]
        fn empty_is_an_error() {
            let scores = Array2::<f32>::zeros((0, 0));
            assert!(matches!(argmax(scores.view()), Err(Error::EmptyScores)));
        }
    }

    mod top_k_tests {
        use super::*;

        #[test]
        fn unsorted_scores() {
            let scores = array![[0.6, 0.897, 0.01], [0.345, 0.28473, 0.5]];
            assert_eq!(top_k(scores.view(), 4).unwrap(), vec![1, 0, 5, 3]);
        }

        #[test]
        fn all_same_scores() {
            let scores = Array2::<f32>::from_elem((2, 2), 0.5);
            assert_eq!(top_k(scores.view(), 5).unwrap(), vec![0, 1, 2, 3]);
        }

        #[test]
        fn first_agrees_with_argmax() {
            let scores = array![[0.2, 0.8, 0.8], [0.1, 0.8, 0.0], [0.3, 0.3, 0.3]];
            assert_eq!(
                top_k(scores.view(), 1).unwrap()[0],
                argmax(scores.view()).unwrap()
            );
        }
    }

    mod second_candidate_tests {
        use super::*;

        #[test]
        fn skips_neighbours() {
            let grid = Grid::new(8);
            // 9 and 18 touch 9; 27 is two cells away.
            let ranked = [9, 18, 10, 27, 0];
            assert_eq!(second_candidate(grid, 9, &ranked), Some(27));
        }

        #[test]
        fn none_when_pool_is_all_neighbours() {
            let grid = Grid::new(8);
            let ranked = [9, 0, 1, 2, 8];
            assert_eq!(second_candidate(grid, 9, &ranked), None);
        }
    }
}
