use super::{Assignment, LossMap};
use crate::{common::*, label::TargetRecord, model::PredictionOutput};
use tch_modules::{BceWithLogitsLoss, BceWithLogitsLossInit};

/// Region mask losses, producing `loss_hum_mask`, `loss_obj_mask` and
/// `loss_uni_mask`.
///
/// The region logits are per-image maps, so a matched slot reads the maps
/// of its image. The union target is the element-wise maximum of the
/// subject and object masks.
#[derive(Debug)]
pub struct MaskLoss {
    bce: BceWithLogitsLoss,
}

impl MaskLoss {
    pub fn new() -> Self {
        Self {
            bce: BceWithLogitsLossInit::default(Reduction::Mean).build(),
        }
    }

    pub fn forward(
        &self,
        outputs: &PredictionOutput,
        targets: &[TargetRecord],
        assignment: &Assignment,
    ) -> Result<LossMap> {
        let (hum_region, obj_region, uni_region) = outputs.regions()?;
        let device = hum_region.device();

        let mut losses = LossMap::new();
        if assignment.num_matched() == 0 {
            ["loss_hum_mask", "loss_obj_mask", "loss_uni_mask"]
                .into_iter()
                .for_each(|key| {
                    losses.insert(key.into(), zero_loss(device));
                });
            return Ok(losses);
        }

        let permutation = assignment.src_permutation();
        let pred_hum = permutation.f_gather_batch(hum_region)?;
        let pred_obj = permutation.f_gather_batch(obj_region)?;
        let pred_uni = permutation.f_gather_batch(uni_region)?;

        let (target_hum, target_obj) = {
            let (hum_masks, obj_masks): (Vec<_>, Vec<_>) = assignment
                .matched_targets(targets)
                .map(|(target, index)| target.pair_masks(index))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .unzip();
            let kind = pred_hum.kind();
            (
                Tensor::stack(&hum_masks, 0).to_device(device).to_kind(kind),
                Tensor::stack(&obj_masks, 0).to_device(device).to_kind(kind),
            )
        };
        let target_uni = target_hum.maximum(&target_obj);

        for (key, pred, target) in [
            ("loss_hum_mask", &pred_hum, &target_hum),
            ("loss_obj_mask", &pred_obj, &target_obj),
            ("loss_uni_mask", &pred_uni, &target_uni),
        ] {
            ensure!(
                pred.size() == target.size(),
                "the predicted region in shape {:?} does not match the target mask in shape {:?}",
                pred.size(),
                target.size()
            );
            losses.insert(key.into(), self.bce.forward(pred, target));
        }

        Ok(losses)
    }
}

impl Default for MaskLoss {
    fn default() -> Self {
        Self::new()
    }
}
