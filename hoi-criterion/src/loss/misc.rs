use crate::common::*;
use strum::{Display, EnumIter, EnumString};

/// Loss values keyed by name, in insertion order.
pub type LossMap = IndexMap<String, Tensor>;

/// The loss functions a criterion can compute.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LossKind {
    /// Interaction classification, producing `loss_ce` and `class_error`.
    Labels,
    /// Box regression, producing `loss_bbox` and `loss_giou`.
    Boxes,
    /// Slot confidence, producing `loss_conf`.
    Confidences,
    /// Region masks, producing `loss_hum_mask`, `loss_obj_mask` and `loss_uni_mask`.
    Masks,
}

impl LossKind {
    /// Parse a loss name.
    pub fn parse(name: &str) -> Result<Self> {
        name.parse()
            .map_err(|_| format_err!("do you really want to compute '{}' loss?", name))
    }

    /// The loss kinds replicated on intermediate decoder layers.
    pub fn aux_kinds() -> [Self; 2] {
        [Self::Boxes, Self::Confidences]
    }

    /// The keys this kind inserts into a [LossMap].
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            Self::Labels => &["loss_ce", "class_error"],
            Self::Boxes => &["loss_bbox", "loss_giou"],
            Self::Confidences => &["loss_conf"],
            Self::Masks => &["loss_hum_mask", "loss_obj_mask", "loss_uni_mask"],
        }
    }
}

/// Append `_<layer_index>` to every key of a loss map.
pub fn suffix_keys(losses: LossMap, layer_index: usize) -> LossMap {
    losses
        .into_iter()
        .map(|(key, value)| (format!("{}_{}", key, layer_index), value))
        .collect()
}
