//! Dense class targets for the matched predictions.

use super::Assignment;
use crate::{common::*, label::TargetRecord};

/// The label space used for classification targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelMode {
    /// Classes are remapped to the distinct interaction classes of the
    /// mini-batch, in order of first appearance.
    Compressed,
    /// Classes keep their dataset-global identifiers.
    Global,
}

impl LabelMode {
    pub fn new(training: bool, consider_all: bool) -> Self {
        if training && !consider_all {
            Self::Compressed
        } else {
            Self::Global
        }
    }
}

/// Classification targets of matched predictions, in assignment order.
#[derive(Debug, TensorLike)]
pub struct ResolvedLabels {
    /// The class id of every matched prediction, an int64 `[num_matched]` tensor.
    pub classes_i: Tensor,
    /// The multi-label indicator in shape `[num_matched, num_local_classes]`.
    /// It is only present in the compressed mode.
    pub classes_t: Option<Tensor>,
    /// The number of distinct classes in the mini-batch.
    #[tensor_like(copy)]
    pub num_local_classes: i64,
}

/// Map every distinct global class id in the targets to a dense local id,
/// by the order of first appearance.
///
/// All annotated interactions take part, matched or not.
pub fn local_class_map(targets: &[TargetRecord]) -> IndexMap<i64, i64> {
    let unique: IndexSet<i64> = targets
        .iter()
        .flat_map(|target| target.hois().iter().map(|hoi| hoi.hoi_id))
        .collect();
    unique
        .into_iter()
        .enumerate()
        .map(|(local_id, global_id)| (global_id, local_id as i64))
        .collect()
}

pub fn resolve_labels(
    targets: &[TargetRecord],
    assignment: &Assignment,
    mode: LabelMode,
    device: Device,
) -> Result<ResolvedLabels> {
    let class_map = local_class_map(targets);
    let num_local_classes = class_map.len() as i64;

    let global_ids = assignment
        .matched_targets(targets)
        .map(|(target, index)| -> Result<_> { Ok(target.hoi(index)?.hoi_id) })
        .collect::<Result<Vec<i64>>>()?;

    let labels = match mode {
        LabelMode::Global => ResolvedLabels {
            classes_i: Tensor::of_slice(&global_ids),
            classes_t: None,
            num_local_classes,
        },
        LabelMode::Compressed => {
            // every annotated class has an entry
            let local_ids: Vec<i64> = global_ids.iter().map(|id| class_map[id]).collect();
            let classes_i = Tensor::of_slice(&local_ids);
            let classes_t = if local_ids.is_empty() {
                Tensor::zeros(&[0, num_local_classes], (Kind::Int64, Device::Cpu))
            } else {
                classes_i.one_hot(num_local_classes)
            };

            ResolvedLabels {
                classes_i,
                classes_t: Some(classes_t),
                num_local_classes,
            }
        }
    };

    Ok(labels.to_device(device))
}
