use super::{Assignment, LossMap};
use crate::{common::*, label::TargetRecord, model::PredictionOutput};

/// L1 and GIoU losses on the subject and object boxes of matched slots,
/// producing `loss_bbox` and `loss_giou`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxLoss;

impl BoxLoss {
    pub fn forward(
        &self,
        outputs: &PredictionOutput,
        targets: &[TargetRecord],
        assignment: &Assignment,
        num_interactions: f64,
    ) -> Result<LossMap> {
        let pred_boxes = outputs.pred_boxes()?;
        let (_batch_size, _num_slots, num_params) = pred_boxes.size3()?;
        ensure!(
            num_params == 8,
            "expect pred_boxes in shape [batch, slots, 8], but get {:?}",
            pred_boxes.size()
        );
        let device = pred_boxes.device();

        let mut losses = LossMap::new();
        if assignment.num_matched() == 0 {
            losses.insert("loss_bbox".into(), zero_loss(device));
            losses.insert("loss_giou".into(), zero_loss(device));
            return Ok(losses);
        }

        let src_boxes = assignment.src_permutation().f_gather(pred_boxes)?;
        let target_boxes = {
            let boxes = assignment
                .matched_targets(targets)
                .map(|(target, index)| target.pair_boxes(index))
                .collect::<Result<Vec<_>>>()?;
            Tensor::stack(&boxes, 0)
                .to_device(device)
                .to_kind(src_boxes.kind())
        };

        // subject boxes take the first four columns, object boxes the rest
        let (subject_l1, subject_giou) = paired_box_losses(
            &src_boxes.narrow(1, 0, 4),
            &target_boxes.narrow(1, 0, 4),
            num_interactions,
        )?;
        let (object_l1, object_giou) = paired_box_losses(
            &src_boxes.narrow(1, 4, 4),
            &target_boxes.narrow(1, 4, 4),
            num_interactions,
        )?;

        losses.insert("loss_bbox".into(), subject_l1 + object_l1);
        losses.insert("loss_giou".into(), subject_giou + object_giou);
        Ok(losses)
    }
}

/// The summed L1 distance and `1 - GIoU` of row-wise paired `[n, 4]` boxes,
/// each divided by `normalizer`.
fn paired_box_losses(src: &Tensor, tgt: &Tensor, normalizer: f64) -> Result<(Tensor, Tensor)> {
    let l1_loss = src.l1_loss(tgt, Reduction::Sum) / normalizer;
    let giou = CxCyWHTensor::from_packed(src)?.giou_with(&CxCyWHTensor::from_packed(tgt)?);
    let giou_loss = (1.0f64 - giou).sum(Kind::Float) / normalizer;
    Ok((l1_loss, giou_loss))
}
