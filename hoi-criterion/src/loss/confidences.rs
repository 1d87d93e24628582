use super::{Assignment, LossMap};
use crate::{common::*, model::PredictionOutput};

/// Binary cross entropy between slot confidences and the matched slot
/// indicator, producing `loss_conf`.
///
/// Unmatched slots are weighted by `eos_coef`.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceLoss {
    eos_coef: f64,
}

impl ConfidenceLoss {
    pub fn new(eos_coef: f64) -> Result<Self> {
        ensure!(
            eos_coef > 0.0 && eos_coef <= 1.0,
            "eos_coef must be in range (0, 1], but get {}",
            eos_coef
        );
        Ok(Self { eos_coef })
    }

    pub fn eos_coef(&self) -> f64 {
        self.eos_coef
    }

    pub fn forward(&self, outputs: &PredictionOutput, assignment: &Assignment) -> Result<LossMap> {
        let box_scores = outputs.box_scores()?;
        let (batch_size, num_slots, num_scores) = box_scores.size3()?;
        ensure!(
            num_scores == 1,
            "expect box_scores in shape [batch, slots, 1], but get {:?}",
            box_scores.size()
        );
        let device = box_scores.device();

        let loss_conf = if batch_size * num_slots == 0 {
            zero_loss(device)
        } else {
            let probs = box_scores.sigmoid().view([batch_size, num_slots]);
            let options = (probs.kind(), device);
            let permutation = assignment.src_permutation();
            let matched = Tensor::ones(&[permutation.num_samples()], options);

            let mut target = Tensor::zeros(&[batch_size, num_slots], options);
            permutation.f_scatter_(&mut target, &matched)?;

            let mut weight = Tensor::full(&[batch_size, num_slots], self.eos_coef, options);
            permutation.f_scatter_(&mut weight, &matched)?;

            probs.binary_cross_entropy(&target, Some(&weight), Reduction::Mean)
        };

        let mut losses = LossMap::new();
        losses.insert("loss_conf".into(), loss_conf);
        Ok(losses)
    }
}
