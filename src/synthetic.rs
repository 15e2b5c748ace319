//! Head outputs rendered from a known pose.

use crate::{
    error::Error,
    model::{HeadOutputs, HM, HM_HP, HPS, HP_OFFSET},
};
use ndarray::Array3;
use num_traits::cast::ToPrimitive;

const PEAK_LOGIT: f32 = 8.0;
const BACKGROUND_LOGIT: f32 = -8.0;
const SIGMA: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticPose {
    pub feature_size: usize,
    /// Cell of the person center.
    pub center: (usize, usize),
    /// Joint positions `(y, x)` in grid units.
    pub joints: Vec<(f32, f32)>,
    pub peak_logit: f32,
    pub background_logit: f32,
    /// Standard deviation of the heatmap blobs, in cells.
    pub sigma: f32,
}

impl SyntheticPose {
    pub fn new(feature_size: usize, center: (usize, usize), joints: Vec<(f32, f32)>) -> Self {
        Self {
            feature_size,
            center,
            joints,
            peak_logit: PEAK_LOGIT,
            background_logit: BACKGROUND_LOGIT,
            sigma: SIGMA,
        }
    }

    /// Joints spread on a circle around the middle of the grid, rotated by `phase` radians.
    pub fn ring(feature_size: usize, num_joints: usize, phase: f32) -> Result<Self, Error> {
        let size = feature_size.to_f32().ok_or(Error::ConvertToF32)?;
        let count = num_joints.to_f32().ok_or(Error::ConvertToF32)?;
        let middle = size / 2.0;
        let radius = size / 4.0;
        let joints = (0..num_joints)
            .map(|i| {
                let angle = phase
                    + std::f32::consts::TAU * i.to_f32().ok_or(Error::ConvertToF32)? / count;
                Ok((middle + radius * angle.sin(), middle + radius * angle.cos()))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self::new(
            feature_size,
            (feature_size / 2, feature_size / 2),
            joints,
        ))
    }

    fn cell_of(&self, (y, x): (f32, f32)) -> Result<(usize, usize), Error> {
        let last = self.feature_size.saturating_sub(1);
        let row = y.floor().max(0.0).to_usize().ok_or(Error::ConvertToUSize)?;
        let col = x.floor().max(0.0).to_usize().ok_or(Error::ConvertToUSize)?;
        Ok((row.min(last), col.min(last)))
    }

    fn blob(&self, (row, col): (usize, usize), y: usize, x: usize) -> Result<f32, Error> {
        let dy = y.to_f32().ok_or(Error::ConvertToF32)? - row.to_f32().ok_or(Error::ConvertToF32)?;
        let dx = x.to_f32().ok_or(Error::ConvertToF32)? - col.to_f32().ok_or(Error::ConvertToF32)?;
        let falloff = (-(dy * dy + dx * dx) / (2.0 * self.sigma * self.sigma)).exp();
        Ok(self.background_logit + (self.peak_logit - self.background_logit) * falloff)
    }

    /// Render the four decoder heads in height x width x channel layout.
    pub fn render(&self) -> Result<HeadOutputs, Error> {
        let size = self.feature_size;
        let joints = self.joints.len();
        let joint_cells = self
            .joints
            .iter()
            .map(|&joint| self.cell_of(joint))
            .collect::<Result<Vec<_>, Error>>()?;

        let mut center = Array3::zeros((size, size, 1));
        let mut heatmap = Array3::zeros((size, size, joints));
        let mut regress = Array3::zeros((size, size, 2 * joints));
        let mut offset = Array3::zeros((size, size, 2 * joints));

        for y in 0..size {
            for x in 0..size {
                center[(y, x, 0)] = self.blob(self.center, y, x)?;
                let cell_y = y.to_f32().ok_or(Error::ConvertToF32)?;
                let cell_x = x.to_f32().ok_or(Error::ConvertToF32)?;
                for (k, (&(joint_y, joint_x), &joint_cell)) in
                    self.joints.iter().zip(&joint_cells).enumerate()
                {
                    heatmap[(y, x, k)] = self.blob(joint_cell, y, x)?;
                    // Every cell points at the joint, so any selected cell
                    // refines to the exact position.
                    regress[(y, x, 2 * k)] = joint_y - cell_y;
                    regress[(y, x, 2 * k + 1)] = joint_x - cell_x;
                    offset[(y, x, 2 * k)] = joint_y - cell_y;
                    offset[(y, x, 2 * k + 1)] = joint_x - cell_x;
                }
            }
        }

        let mut outputs = HeadOutputs::new();
        outputs.insert_hwc(HM, center);
        outputs.insert_hwc(HM_HP, heatmap);
        outputs.insert_hwc(HPS, regress);
        outputs.insert_hwc(HP_OFFSET, offset);
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::SyntheticPose;
    use crate::decode::{Decoder, Options, Weighting};
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn shapes() {
        let outputs = SyntheticPose::ring(16, 5, 0.0).unwrap().render().unwrap();
        let tensors = outputs.tensors().unwrap();
        assert_eq!(tensors.center.dim(), (16, 16, 1));
        assert_eq!(tensors.keypoint_heatmap.dim(), (16, 16, 5));
        assert_eq!(tensors.keypoint_regress.dim(), (16, 16, 10));
        assert_eq!(tensors.keypoint_offset.dim(), (16, 16, 10));
    }

    #[test]
    fn decoding_recovers_joints() {
        let pose = SyntheticPose::ring(48, 17, 0.3).unwrap();
        let outputs = pose.render().unwrap();
        let decoder = Decoder::new(48, 17).unwrap();
        let decoded = decoder.decode(outputs.tensors().unwrap()).unwrap();
        assert_eq!(decoded.center, 24 * 48 + 24);
        for (keypoint, &(y, x)) in decoded.primary.keypoints.iter().zip(&pose.joints) {
            assert_approx_eq!(keypoint.y, y / 48.0, 1e-5);
            assert_approx_eq!(keypoint.x, x / 48.0, 1e-5);
            assert!(keypoint.score > 0.99);
        }
    }

    #[test]
    fn off_center_person_is_still_found() {
        let pose = SyntheticPose::new(
            32,
            (10, 20),
            vec![(6.25, 18.5), (14.75, 22.0), (10.5, 27.25)],
        );
        let outputs = pose.render().unwrap();
        for weighting in [Weighting::Distance, Weighting::Uniform] {
            let decoder = Decoder::with_options(Options {
                feature_size: 32,
                num_joints: 3,
                weighting,
                ..Default::default()
            })
            .unwrap();
            let decoded = decoder.decode(outputs.tensors().unwrap()).unwrap();
            assert_eq!(decoded.center, 10 * 32 + 20);
            for (keypoint, &(y, x)) in decoded.primary.keypoints.iter().zip(&pose.joints) {
                assert_approx_eq!(keypoint.y, y / 32.0, 1e-5);
                assert_approx_eq!(keypoint.x, x / 32.0, 1e-5);
            }
        }
    }
}
