use ndarray::Array2;
use num_traits::FromPrimitive;

/// COCO keypoint order used by the single-person MoveNet models.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_derive::FromPrimitive)]
pub enum KeypointKind {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

pub const NUM_KEYPOINTS: usize = 17;

/// A decoded joint. `y` and `x` are fractions of the image height and width.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Keypoint {
    pub kind: Option<KeypointKind>,
    pub y: f32,
    pub x: f32,
    pub score: f32,
}

impl Keypoint {
    /// Position in pixels of an image with the given dimensions, as `(x, y)`.
    pub fn to_pixels(&self, height: u32, width: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub keypoints: Vec<Keypoint>,
}

impl Pose {
    /// Build a pose from `(y, x, score)` triples, labelling them with COCO
    /// kinds when there are exactly [`NUM_KEYPOINTS`] of them.
    pub fn from_triples<I>(triples: I) -> Self
    where
        I: IntoIterator<Item = (f32, f32, f32)>,
    {
        let mut keypoints = triples
            .into_iter()
            .map(|(y, x, score)| Keypoint {
                kind: None,
                y,
                x,
                score,
            })
            .collect::<Vec<_>>();
        if keypoints.len() == NUM_KEYPOINTS {
            for (i, keypoint) in keypoints.iter_mut().enumerate() {
                keypoint.kind = KeypointKind::from_usize(i);
            }
        }
        Self { keypoints }
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Mean keypoint score.
    pub fn score(&self) -> f32 {
        if self.keypoints.is_empty() {
            return 0.0;
        }
        self.keypoints.iter().map(|k| k.score).sum::<f32>() / self.keypoints.len() as f32
    }

    /// `K x 3` array of `(y, x, score)` rows.
    pub fn to_array(&self) -> Array2<f32> {
        let mut array = Array2::zeros((self.keypoints.len(), 3));
        for (mut row, keypoint) in array.outer_iter_mut().zip(&self.keypoints) {
            row[0] = keypoint.y;
            row[1] = keypoint.x;
            row[2] = keypoint.score;
        }
        array
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn coco_pose_is_labelled() {
        let pose = Pose::from_triples((0..NUM_KEYPOINTS).map(|i| (0.0, 0.0, i as f32)));
        assert_eq!(pose.keypoints[0].kind, Some(KeypointKind::Nose));
        assert_eq!(
            pose.keypoints[NUM_KEYPOINTS - 1].kind,
            Some(KeypointKind::RightAnkle)
        );
    }

    #[test]
    fn other_layouts_are_not_labelled() {
        let pose = Pose::from_triples(vec![(0.1, 0.2, 0.3); 21]);
        assert!(pose.keypoints.iter().all(|k| k.kind.is_none()));
    }

    #[test]
    fn array_rows_are_y_x_score() {
        let pose = Pose::from_triples(vec![(0.1, 0.2, 0.3), (0.4, 0.5, 0.7)]);
        let array = pose.to_array();
        assert_eq!(array.dim(), (2, 3));
        assert_approx_eq!(array[(1, 0)], 0.4);
        assert_approx_eq!(array[(1, 1)], 0.5);
        assert_approx_eq!(array[(1, 2)], 0.7);
        assert_approx_eq!(pose.score(), 0.5);
    }

    #[test]
    fn pixels() {
        let keypoint = Keypoint {
            kind: None,
            y: 0.5,
            x: 0.25,
            score: 1.0,
        };
        let (x, y) = keypoint.to_pixels(192, 256);
        assert_approx_eq!(x, 64.0);
        assert_approx_eq!(y, 96.0);
    }
}
