//! Geometric decoding of single-person MoveNet outputs.
//!
//! The network produces four maps over an `F x F` grid: a center heatmap, a
//! heatmap per joint, a regression field pointing from the center cell to
//! every joint, and a sub-cell offset field. Decoding picks the person center
//! with a prior toward the middle of the image, follows the regression to a
//! coarse location per joint, searches the joint heatmap around that location
//! and finally refines the chosen cell with its offset.

use crate::{
    error::Error,
    pose::{Pose, NUM_KEYPOINTS},
};
use candidates::{argmax, second_candidate, top_k, SECOND_CANDIDATE_POOL};
use grid::{Cell, Grid};
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};
use num_traits::cast::ToPrimitive;
use std::str::FromStr;
use tracing::trace;

mod candidates;
pub mod grid;
mod maps;

const DEFAULT_FEATURE_SIZE: &str = "48";
const DEFAULT_NUM_JOINTS: &str = "17";
const DEFAULT_CENTER_DELTA: &str = "1.8";
const DEFAULT_REFINEMENT: &str = "top2";
const DEFAULT_WEIGHTING: &str = "distance";

pub const CENTER_DELTA: f32 = 1.8;

/// Which hypotheses a decode call produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refinement {
    /// Only the best cell per joint.
    Top1,
    /// The best cell and a second, non-adjacent cell per joint.
    Top2,
}

impl FromStr for Refinement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top1" | "top-1" => Ok(Self::Top1),
            "top2" | "top-2" => Ok(Self::Top2),
            _ => Err(Error::ParseOption {
                kind: "refinement",
                value: s.to_owned(),
            }),
        }
    }
}

/// How joint heatmaps are scored when searching around the regressed location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// Divide the heatmap by the smoothed distance to the regressed location.
    Distance,
    /// Use the heatmap as is.
    Uniform,
}

impl FromStr for Weighting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "distance" => Ok(Self::Distance),
            "uniform" => Ok(Self::Uniform),
            _ => Err(Error::ParseOption {
                kind: "weighting",
                value: s.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, structopt::StructOpt)]
pub struct Options {
    /// Side length of the square output grid.
    #[structopt(short = "-F", long, default_value = DEFAULT_FEATURE_SIZE)]
    pub feature_size: usize,
    /// Number of keypoint channels.
    #[structopt(short = "-K", long, default_value = DEFAULT_NUM_JOINTS)]
    pub num_joints: usize,
    /// Smoothing added to every distance before inverting it.
    #[structopt(short = "-d", long, default_value = DEFAULT_CENTER_DELTA)]
    pub center_delta: f32,
    /// top1 or top2.
    #[structopt(short, long, default_value = DEFAULT_REFINEMENT)]
    pub refinement: Refinement,
    /// distance or uniform.
    #[structopt(short, long, default_value = DEFAULT_WEIGHTING)]
    pub weighting: Weighting,
    /// Do not clamp decoded coordinates to [0, 1].
    #[structopt(long)]
    pub unclamped: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            feature_size: 48,
            num_joints: NUM_KEYPOINTS,
            center_delta: CENTER_DELTA,
            refinement: Refinement::Top2,
            weighting: Weighting::Distance,
            unclamped: false,
        }
    }
}

/// Network outputs in height x width x channel layout.
#[derive(Debug, Clone, Copy)]
pub struct Tensors<'a> {
    /// `F x F x 1` center logits.
    pub center: ArrayView3<'a, f32>,
    /// `F x F x K` joint logits.
    pub keypoint_heatmap: ArrayView3<'a, f32>,
    /// `F x F x 2K` center-to-joint regression, interleaved `(dy, dx)` per joint.
    pub keypoint_regress: ArrayView3<'a, f32>,
    /// `F x F x 2K` sub-cell offsets, interleaved `(dy, dx)` per joint.
    pub keypoint_offset: ArrayView3<'a, f32>,
}

/// Flattened grid indices chosen for every joint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates {
    pub top1: Vec<usize>,
    /// Absent when refinement is [`Refinement::Top1`] or when none of the
    /// best-ranked cells is more than one cell away from `top1`.
    pub top2: Vec<Option<usize>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Flattened index of the selected person center.
    pub center: usize,
    pub candidates: Candidates,
    pub primary: Pose,
    /// Pose built from the second candidates. Joints without one repeat
    /// their primary keypoint.
    pub alternate: Option<Pose>,
}

impl Decoded {
    pub fn poses(&self) -> impl Iterator<Item = &Pose> {
        std::iter::once(&self.primary).chain(self.alternate.as_ref())
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn to_f32(value: usize) -> Result<f32, Error> {
    value.to_f32().ok_or(Error::ConvertToF32)
}

fn check_shape(
    name: &'static str,
    tensor: &ArrayView3<f32>,
    expected: [usize; 3],
) -> Result<(), Error> {
    if tensor.shape() == expected {
        Ok(())
    } else {
        Err(Error::TensorShape {
            name,
            expected,
            actual: tensor.shape().to_vec(),
        })
    }
}

/// Decoder for a fixed grid size and joint count.
///
/// Holds only immutable precomputed maps, so one instance can be shared
/// between threads.
#[derive(Debug, Clone)]
pub struct Decoder {
    options: Options,
    grid: Grid,
    weight_to_center: Array2<f32>,
    dist_y: Array3<f32>,
    dist_x: Array3<f32>,
}

impl Decoder {
    pub fn new(feature_size: usize, num_joints: usize) -> Result<Self, Error> {
        Self::with_options(Options {
            feature_size,
            num_joints,
            ..Default::default()
        })
    }

    pub fn with_options(options: Options) -> Result<Self, Error> {
        let Options {
            feature_size,
            num_joints,
            center_delta,
            ..
        } = options;
        if feature_size == 0 {
            return Err(Error::ZeroFeatureSize);
        }
        if num_joints == 0 {
            return Err(Error::ZeroNumJoints);
        }
        if !center_delta.is_finite() || center_delta <= 0.0 {
            return Err(Error::InvalidCenterDelta(center_delta));
        }
        let weight_to_center = maps::center_weight_map(feature_size, center_delta)?;
        let (dist_y, dist_x) = maps::distance_maps(feature_size)?;
        Ok(Self {
            options,
            grid: Grid::new(feature_size),
            weight_to_center,
            dist_y,
            dist_x,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn center_weight_map(&self) -> ArrayView2<f32> {
        self.weight_to_center.view()
    }

    /// Row and column index maps, each `F x F x 1`.
    pub fn distance_maps(&self) -> (ArrayView3<f32>, ArrayView3<f32>) {
        (self.dist_y.view(), self.dist_x.view())
    }

    fn check_shapes(&self, tensors: &Tensors) -> Result<(), Error> {
        let size = self.grid.size();
        let joints = self.options.num_joints;
        check_shape("center", &tensors.center, [size, size, 1])?;
        check_shape(
            "keypoint heatmap",
            &tensors.keypoint_heatmap,
            [size, size, joints],
        )?;
        check_shape(
            "keypoint regression",
            &tensors.keypoint_regress,
            [size, size, 2 * joints],
        )?;
        check_shape(
            "keypoint offset",
            &tensors.keypoint_offset,
            [size, size, 2 * joints],
        )
    }

    /// Decode one set of network outputs.
    pub fn decode(&self, tensors: Tensors) -> Result<Decoded, Error> {
        self.check_shapes(&tensors)?;

        let center = tensors.center.index_axis(Axis(2), 0).mapv(sigmoid);
        let heatmap = tensors.keypoint_heatmap.mapv(sigmoid);

        let center_index = self.top_with_center(center.view())?;
        let coarse = self.center_to_keypoints(tensors.keypoint_regress, center_index)?;
        let candidates = self.keypoints_from_heatmap(heatmap.view(), coarse.view())?;

        let primary =
            self.keypoints_from_offset(tensors.keypoint_offset, heatmap.view(), &candidates.top1)?;
        let alternate = match self.options.refinement {
            Refinement::Top1 => None,
            Refinement::Top2 => {
                let indices = candidates
                    .top2
                    .iter()
                    .zip(&candidates.top1)
                    .map(|(&second, &first)| second.unwrap_or(first))
                    .collect::<Vec<_>>();
                Some(self.keypoints_from_offset(
                    tensors.keypoint_offset,
                    heatmap.view(),
                    &indices,
                )?)
            }
        };

        Ok(Decoded {
            center: center_index,
            candidates,
            primary,
            alternate,
        })
    }

    /// Index of the most likely center after weighting by distance to the
    /// middle of the grid.
    fn top_with_center(&self, center: ArrayView2<f32>) -> Result<usize, Error> {
        let scores = &center * &self.weight_to_center;
        let index = argmax(scores.view())?;
        let Cell { row, col } = self.grid.cell(index);
        trace!(message = "selected center", row, col, score = scores[(row, col)]);
        Ok(index)
    }

    /// Coarse `(y, x)` grid coordinates of every joint, regressed from the
    /// center cell. Shape `K x 2`.
    fn center_to_keypoints(
        &self,
        regress: ArrayView3<f32>,
        center_index: usize,
    ) -> Result<Array2<f32>, Error> {
        let Cell { row, col } = self.grid.cell(center_index);
        let origin = [to_f32(row)?, to_f32(col)?];
        let regress = regress.slice(s![row, col, ..]);
        Ok(Array2::from_shape_fn(
            (self.options.num_joints, 2),
            |(joint, axis)| regress[2 * joint + axis] + origin[axis],
        ))
    }

    fn keypoints_from_heatmap(
        &self,
        heatmap: ArrayView3<f32>,
        coarse: ArrayView2<f32>,
    ) -> Result<Candidates, Error> {
        let scores = match self.options.weighting {
            Weighting::Distance => {
                let delta = self.options.center_delta;
                let joint_y = coarse.column(0).insert_axis(Axis(0)).insert_axis(Axis(0));
                let joint_x = coarse.column(1).insert_axis(Axis(0)).insert_axis(Axis(0));
                let dy = &self.dist_y - &joint_y;
                let dx = &self.dist_x - &joint_x;
                Zip::from(&heatmap)
                    .and(&dy)
                    .and(&dx)
                    .map_collect(|&h, &y, &x| h / ((y * y + x * x).sqrt() + delta))
            }
            Weighting::Uniform => heatmap.to_owned(),
        };

        let num_joints = self.options.num_joints;
        let mut top1 = Vec::with_capacity(num_joints);
        let mut top2 = Vec::with_capacity(num_joints);

        for (joint, joint_scores) in scores.axis_iter(Axis(2)).enumerate() {
            let (first, second) = match self.options.refinement {
                Refinement::Top1 => (argmax(joint_scores)?, None),
                Refinement::Top2 => {
                    let ranked = top_k(joint_scores, SECOND_CANDIDATE_POOL)?;
                    let (&first, rest) = ranked.split_first().ok_or(Error::EmptyScores)?;
                    (first, second_candidate(self.grid, first, rest))
                }
            };
            trace!(message = "joint candidates", joint, first, ?second);
            top1.push(first);
            top2.push(second);
        }

        Ok(Candidates { top1, top2 })
    }

    fn keypoints_from_offset(
        &self,
        offset: ArrayView3<f32>,
        heatmap: ArrayView3<f32>,
        indices: &[usize],
    ) -> Result<Pose, Error> {
        let size = to_f32(self.grid.size())?;
        let triples = indices
            .iter()
            .enumerate()
            .map(|(joint, &index)| {
                let Cell { row, col } = self.grid.cell(index);
                let y = (to_f32(row)? + offset[(row, col, 2 * joint)]) / size;
                let x = (to_f32(col)? + offset[(row, col, 2 * joint + 1)]) / size;
                let score = heatmap[(row, col, joint)];
                Ok(if self.options.unclamped {
                    (y, x, score)
                } else {
                    (y.clamp(0.0, 1.0), x.clamp(0.0, 1.0), score)
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Pose::from_triples(triples))
    }
}
