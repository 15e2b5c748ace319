//! Model-side configuration and the per-head outputs handed to the decoder.

use crate::{
    decode::{Options, Tensors},
    error::Error,
};
use ndarray::{Array3, ArrayView3, ArrayView4, Axis};
use std::{
    collections::{BTreeMap, BTreeSet},
    str::FromStr,
};

/// Center heatmap head.
pub const HM: &str = "hm";
/// Joint heatmap head.
pub const HM_HP: &str = "hm_hp";
/// Center-to-joint regression head.
pub const HPS: &str = "hps";
/// Joint sub-cell offset head.
pub const HP_OFFSET: &str = "hp_offset";

const HEAD_NAMES: [&str; 4] = [HM, HM_HP, HPS, HP_OFFSET];

const DEFAULT_HEAD_CONV: usize = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    Lightning,
    Thunder,
}

impl ModelType {
    /// Side length of the output grid. Lightning takes 192px inputs and
    /// Thunder 256px, both at stride 4.
    pub fn feature_size(self) -> usize {
        match self {
            Self::Lightning => 48,
            Self::Thunder => 64,
        }
    }
}

impl Default for ModelType {
    fn default() -> Self {
        Self::Lightning
    }
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lightning" | "lighting" => Ok(Self::Lightning),
            "thunder" => Ok(Self::Thunder),
            _ => Err(Error::ParseOption {
                kind: "model type",
                value: s.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadSpec {
    pub name: &'static str,
    pub channels: usize,
    pub frozen: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub model_type: ModelType,
    pub num_joints: usize,
    /// Width of the hidden convolution inside every head.
    pub head_conv: usize,
    pub freeze_backbone: bool,
    pub frozen_head_names: BTreeSet<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_type: ModelType::default(),
            num_joints: crate::pose::NUM_KEYPOINTS,
            head_conv: DEFAULT_HEAD_CONV,
            freeze_backbone: true,
            frozen_head_names: BTreeSet::new(),
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.num_joints == 0 {
            return Err(Error::ZeroNumJoints);
        }
        match self
            .frozen_head_names
            .iter()
            .find(|name| !HEAD_NAMES.contains(&name.as_str()))
        {
            Some(name) => Err(Error::UnknownHead(name.clone())),
            None => Ok(()),
        }
    }

    /// Heads in the order the network evaluates them.
    pub fn heads(&self) -> Result<Vec<HeadSpec>, Error> {
        self.validate()?;
        let k = self.num_joints;
        Ok([(HM, 1), (HM_HP, k), (HPS, 2 * k), (HP_OFFSET, 2 * k)]
            .iter()
            .map(|&(name, channels)| HeadSpec {
                name,
                channels,
                frozen: self.frozen_head_names.contains(name),
            })
            .collect())
    }

    pub fn trainable_heads(&self) -> Result<Vec<HeadSpec>, Error> {
        Ok(self
            .heads()?
            .into_iter()
            .filter(|head| !head.frozen)
            .collect())
    }

    /// Decoder options matching this model's grid and joints.
    pub fn decoder_options(&self) -> Options {
        Options {
            feature_size: self.model_type.feature_size(),
            num_joints: self.num_joints,
            ..Default::default()
        }
    }
}

/// Network outputs keyed by head name, stored height x width x channel.
#[derive(Debug, Clone, Default)]
pub struct HeadOutputs {
    outputs: BTreeMap<String, Array3<f32>>,
}

impl HeadOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a head already in height x width x channel layout.
    pub fn insert_hwc(&mut self, name: &str, tensor: Array3<f32>) {
        self.outputs.insert(name.to_owned(), tensor);
    }

    /// Insert a `C x H x W` head, permuting it to `H x W x C`.
    pub fn insert_chw(&mut self, name: &str, tensor: ArrayView3<f32>) {
        let hwc = tensor.permuted_axes([1, 2, 0]).as_standard_layout().into_owned();
        self.insert_hwc(name, hwc);
    }

    /// Insert a `1 x C x H x W` head.
    pub fn insert_batched(&mut self, name: &str, tensor: ArrayView4<f32>) -> Result<(), Error> {
        let batch = tensor.len_of(Axis(0));
        if batch != 1 {
            return Err(Error::BatchSize(name.to_owned(), batch));
        }
        self.insert_chw(name, tensor.index_axis_move(Axis(0), 0));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<ArrayView3<f32>> {
        self.outputs.get(name).map(|tensor| tensor.view())
    }

    fn head(&self, name: &'static str) -> Result<ArrayView3<f32>, Error> {
        self.get(name).ok_or(Error::MissingHead(name))
    }

    /// The four heads the decoder consumes.
    pub fn tensors(&self) -> Result<Tensors, Error> {
        Ok(Tensors {
            center: self.head(HM)?,
            keypoint_heatmap: self.head(HM_HP)?,
            keypoint_regress: self.head(HPS)?,
            keypoint_offset: self.head(HP_OFFSET)?,
        })
    }
}
