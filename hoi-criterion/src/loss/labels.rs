use super::{
    label_resolver::{resolve_labels, LabelMode, ResolvedLabels},
    Assignment, LossMap,
};
use crate::{common::*, label::TargetRecord, model::PredictionOutput};
use tch_modules::{
    BceWithLogitsLossInit, CrossEntropyLoss, FocalLoss, FocalLossInit, MaskedCrossEntropyLoss,
};

/// Hyperparameters of the binary focal variant of the classification loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocalParams {
    pub alpha: f64,
    pub gamma: f64,
}

impl Default for FocalParams {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            gamma: 0.2,
        }
    }
}

/// Interaction classification loss, producing `loss_ce` and the
/// `class_error` diagnostic.
#[derive(Debug)]
pub struct ClassificationLoss {
    focal_loss: Option<FocalLoss>,
    cross_entropy: CrossEntropyLoss,
    masked_cross_entropy: MaskedCrossEntropyLoss,
}

impl ClassificationLoss {
    /// Use the binary focal loss if `focal` is set, otherwise the symmetric
    /// interaction-text alignment loss.
    pub fn new(focal: Option<FocalParams>) -> Result<Self> {
        let focal_loss = focal
            .map(|FocalParams { alpha, gamma }| {
                let bce = BceWithLogitsLossInit::default(Reduction::None).build();
                FocalLossInit {
                    alpha,
                    gamma,
                    ..FocalLossInit::default(Reduction::Sum, move |input, target| {
                        bce.forward(input, target)
                    })
                }
                .build()
            })
            .transpose()?;

        Ok(Self {
            focal_loss,
            cross_entropy: CrossEntropyLoss::new(true, Reduction::Mean),
            masked_cross_entropy: MaskedCrossEntropyLoss::new(),
        })
    }

    pub fn forward(
        &self,
        outputs: &PredictionOutput,
        targets: &[TargetRecord],
        assignment: &Assignment,
        mode: LabelMode,
    ) -> Result<LossMap> {
        let logits = outputs.logits_per_hoi()?;
        let (_batch_size, _num_slots, num_classes) = logits.size3()?;
        let device = logits.device();

        let src_logits = assignment.src_permutation().f_gather(logits)?;
        let ResolvedLabels {
            classes_i,
            classes_t,
            ..
        } = resolve_labels(targets, assignment, mode, device)?;
        let num_matched = classes_i.size1()?;

        if num_matched > 0 {
            let max_class = classes_i.max().int64_value(&[]);
            ensure!(
                max_class < num_classes,
                "class id {} exceeds the {} logit columns",
                max_class,
                num_classes
            );
        }

        let loss_ce = match &self.focal_loss {
            Some(_) if num_matched == 0 => zero_loss(device),
            Some(focal_loss) => {
                let labels = classes_i.one_hot(num_classes).to_kind(src_logits.kind());
                focal_loss.forward(&src_logits, &labels) / num_matched as f64
            }
            None => {
                // interaction to text
                let loss_i = self.cross_entropy.forward(&src_logits, &classes_i)?;

                // text to interaction, only with a batch-local label space
                match classes_t {
                    Some(classes_t) => {
                        let (_, num_local_classes) = classes_t.size2()?;
                        ensure!(
                            num_local_classes <= num_classes,
                            "the mini-batch has {} classes, but there are only {} logit columns",
                            num_local_classes,
                            num_classes
                        );
                        let loss_t = self.masked_cross_entropy.forward(
                            &src_logits.narrow(1, 0, num_local_classes).transpose(0, 1),
                            &classes_t.transpose(0, 1),
                        )?;
                        (loss_i + loss_t) / 2.0
                    }
                    None => loss_i,
                }
            }
        };

        let mut losses = LossMap::new();
        losses.insert("loss_ce".into(), loss_ce);
        losses.insert("class_error".into(), class_error(&src_logits, &classes_i));
        Ok(losses)
    }
}

/// The top-1 classification error in percent.
///
/// It is 100 when there is no sample.
pub fn class_error(logits: &Tensor, classes: &Tensor) -> Tensor {
    tch::no_grad(|| {
        if classes.is_empty() {
            return Tensor::full(&[], 100.0, (Kind::Float, logits.device()));
        }
        logits
            .argmax(-1, false)
            .ne_tensor(classes)
            .to_kind(Kind::Float)
            .mean(Kind::Float)
            * 100.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Hoi;
    use approx::assert_abs_diff_eq;

    fn record(hoi_ids: &[i64]) -> TargetRecord {
        let hois = hoi_ids
            .iter()
            .map(|&hoi_id| Hoi {
                subject_id: 0,
                object_id: 1,
                hoi_id,
            })
            .collect();
        TargetRecord::new(hois, Tensor::rand(&[2, 4], (Kind::Float, Device::Cpu))).unwrap()
    }

    fn outputs(logits: Tensor) -> PredictionOutput {
        PredictionOutput {
            logits_per_hoi: Some(logits),
            ..Default::default()
        }
    }

    fn nll(logits: &[f32], target: usize) -> f64 {
        let max = logits.iter().cloned().fold(f32::MIN, f32::max) as f64;
        let log_sum = logits
            .iter()
            .map(|&value| (value as f64 - max).exp())
            .sum::<f64>()
            .ln()
            + max;
        log_sum - logits[target] as f64
    }

    #[test]
    fn global_mode_test() -> Result<()> {
        let values = [
            2.0f32, 0.5, -1.0, //
            0.0, 0.0, 0.0, //
            -0.3, 1.2, 0.4,
        ];
        let logits = Tensor::of_slice(&values).view([1, 3, 3]);
        let targets = vec![record(&[2, 1])];
        let assignment = Assignment::from_indices(vec![(vec![0, 2], vec![0, 1])])?;

        let losses = ClassificationLoss::new(None)?.forward(
            &outputs(logits),
            &targets,
            &assignment,
            LabelMode::Global,
        )?;

        let expect = (nll(&values[0..3], 2) + nll(&values[6..9], 1)) / 2.0;
        assert_abs_diff_eq!(losses["loss_ce"].double_value(&[]), expect, epsilon = 1e-5);
        // slot 0 predicts class 0 against class 2, slot 2 is correct
        assert_abs_diff_eq!(losses["class_error"].double_value(&[]), 50.0, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn compressed_mode_test() -> Result<()> {
        let logits = Tensor::randn(&[2, 4, 6], (Kind::Float, Device::Cpu));
        let targets = vec![record(&[9, 4]), record(&[2, 9])];
        let assignment =
            Assignment::from_indices(vec![(vec![1, 0], vec![0, 1]), (vec![2, 3], vec![0, 1])])?;

        let loss_fn = ClassificationLoss::new(None)?;
        let losses = loss_fn.forward(
            &outputs(logits.shallow_clone()),
            &targets,
            &assignment,
            LabelMode::Compressed,
        )?;

        // rebuild both directions from the building blocks
        let src_logits = assignment.src_permutation().f_gather(&logits)?;
        let classes_i = Tensor::of_slice(&[0i64, 1, 2, 0]);
        let loss_i =
            CrossEntropyLoss::new(true, Reduction::Mean).forward(&src_logits, &classes_i)?;
        let loss_t = MaskedCrossEntropyLoss::new().forward(
            &src_logits.narrow(1, 0, 3).transpose(0, 1),
            &classes_i.one_hot(3).transpose(0, 1),
        )?;
        let expect = (loss_i.double_value(&[]) + loss_t.double_value(&[])) / 2.0;

        assert_abs_diff_eq!(losses["loss_ce"].double_value(&[]), expect, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn focal_mode_test() -> Result<()> {
        let logits = Tensor::randn(&[1, 3, 4], (Kind::Float, Device::Cpu));
        let targets = vec![record(&[3, 0])];
        let assignment = Assignment::from_indices(vec![(vec![2, 1], vec![0, 1])])?;

        let params = FocalParams {
            alpha: 0.25,
            gamma: 2.0,
        };
        let losses = ClassificationLoss::new(Some(params))?.forward(
            &outputs(logits.shallow_clone()),
            &targets,
            &assignment,
            LabelMode::Global,
        )?;

        let values: Vec<f32> =
            Vec::from(&assignment.src_permutation().f_gather(&logits)?.view([-1]));
        let labels = [0.0f64, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let expect = values
            .iter()
            .zip(&labels)
            .map(|(&x, &y)| {
                let x = x as f64;
                let prob = 1.0 / (1.0 + (-x).exp());
                let bce = -(y * prob.ln() + (1.0 - y) * (1.0 - prob).ln());
                (1.0 - y - params.alpha).abs() * ((y - prob).abs() + 1e-6).powf(params.gamma) * bce
            })
            .sum::<f64>()
            / 2.0;

        assert_abs_diff_eq!(losses["loss_ce"].double_value(&[]), expect, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn empty_assignment_test() -> Result<()> {
        let logits = Tensor::randn(&[1, 3, 4], (Kind::Float, Device::Cpu));
        let targets = vec![record(&[])];
        let assignment = Assignment::from_indices(vec![(vec![], vec![])])?;

        for focal in [None, Some(FocalParams::default())] {
            for mode in [LabelMode::Compressed, LabelMode::Global] {
                let losses = ClassificationLoss::new(focal)?.forward(
                    &outputs(logits.shallow_clone()),
                    &targets,
                    &assignment,
                    mode,
                )?;
                assert_eq!(losses["loss_ce"].double_value(&[]), 0.0);
                assert_eq!(losses["class_error"].double_value(&[]), 100.0);
            }
        }
        Ok(())
    }

    #[test]
    fn class_out_of_range_test() -> Result<()> {
        let logits = Tensor::randn(&[1, 2, 3], (Kind::Float, Device::Cpu));
        let targets = vec![record(&[7])];
        let assignment = Assignment::from_indices(vec![(vec![0], vec![0])])?;

        let result = ClassificationLoss::new(None)?.forward(
            &outputs(logits),
            &targets,
            &assignment,
            LabelMode::Global,
        );
        assert!(result.is_err());
        Ok(())
    }
}
