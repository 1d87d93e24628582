//! The set-prediction criterion.

use super::{
    boxes::BoxLoss,
    confidences::ConfidenceLoss,
    label_resolver::LabelMode,
    labels::{ClassificationLoss, FocalParams},
    masks::MaskLoss,
    misc::{suffix_keys, LossKind, LossMap},
    Assignment, DistributedReduce, LocalProcess, Matcher,
};
use crate::{common::*, label::TargetRecord, model::PredictionOutput, profiling::Timing};

pub use set_criterion::*;

mod set_criterion {
    use super::*;

    #[derive(Derivative)]
    #[derivative(Debug)]
    pub struct SetCriterionInit {
        /// Computes the slot to interaction assignment.
        #[derivative(Debug = "ignore")]
        pub matcher: Box<dyn Matcher>,
        /// Sums the interaction count across processes.
        #[derivative(Debug = "ignore")]
        pub distributed: Box<dyn DistributedReduce>,
        /// The losses to compute on the last decoder layer.
        pub losses: Vec<LossKind>,
        /// The confidence loss weight of unmatched slots.
        pub eos_coef: f64,
        /// Use the binary focal loss for classification if set.
        pub focal_loss: Option<FocalParams>,
        /// Keep the global label space in training.
        pub consider_all: bool,
    }

    impl SetCriterionInit {
        pub fn new<M>(matcher: M) -> Self
        where
            M: 'static + Matcher,
        {
            Self {
                matcher: Box::new(matcher),
                distributed: Box::new(LocalProcess),
                losses: vec![LossKind::Labels, LossKind::Boxes, LossKind::Confidences],
                eos_coef: 0.1,
                focal_loss: None,
                consider_all: false,
            }
        }

        pub fn build(self) -> Result<SetCriterion> {
            let Self {
                matcher,
                distributed,
                losses,
                eos_coef,
                focal_loss,
                consider_all,
            } = self;

            ensure!(!losses.is_empty(), "at least one loss must be enabled");
            ensure!(
                losses.iter().collect::<HashSet<_>>().len() == losses.len(),
                "the enabled losses {:?} contain duplicates",
                losses
            );
            ensure!(
                distributed.world_size() >= 1,
                "the world size must be at least 1"
            );

            Ok(SetCriterion {
                matcher,
                distributed,
                losses,
                classification: ClassificationLoss::new(focal_loss)?,
                boxes: BoxLoss,
                confidences: ConfidenceLoss::new(eos_coef)?,
                masks: MaskLoss::new(),
                consider_all,
                training: true,
            })
        }
    }

    /// Matches predictions to ground truth and computes the loss terms over
    /// the assignment.
    ///
    /// The returned losses are unweighted. See [LossWeights](crate::loss::LossWeights)
    /// to combine them.
    #[derive(Derivative)]
    #[derivative(Debug)]
    pub struct SetCriterion {
        #[derivative(Debug = "ignore")]
        matcher: Box<dyn Matcher>,
        #[derivative(Debug = "ignore")]
        distributed: Box<dyn DistributedReduce>,
        losses: Vec<LossKind>,
        classification: ClassificationLoss,
        boxes: BoxLoss,
        confidences: ConfidenceLoss,
        masks: MaskLoss,
        consider_all: bool,
        training: bool,
    }

    impl SetCriterion {
        pub fn train(&mut self) {
            self.training = true;
        }

        pub fn eval(&mut self) {
            self.training = false;
        }

        pub fn is_training(&self) -> bool {
            self.training
        }

        pub fn losses(&self) -> &[LossKind] {
            &self.losses
        }

        pub fn label_mode(&self) -> LabelMode {
            LabelMode::new(self.training, self.consider_all)
        }

        /// The average number of annotated interactions per process, at
        /// least 1.
        pub fn num_interactions(&self, targets: &[TargetRecord], device: Device) -> Result<f64> {
            let total: usize = targets.iter().map(|target| target.num_hois()).sum();

            let mut count = Tensor::of_slice(&[total as f32]).to_device(device);
            self.distributed.all_reduce(&mut count)?;
            let world_size = self.distributed.world_size();
            ensure!(world_size >= 1, "the world size must be at least 1");

            let average = count.double_value(&[0]) / world_size as f64;
            if average < 1.0 {
                warn!(
                    "the batch has {} interactions on average, the normalizer is clamped to 1",
                    average
                );
            }
            Ok(average.max(1.0))
        }

        /// Compute one kind of loss over a given assignment.
        pub fn get_loss(
            &self,
            kind: LossKind,
            outputs: &PredictionOutput,
            targets: &[TargetRecord],
            assignment: &Assignment,
            num_interactions: f64,
        ) -> Result<LossMap> {
            let losses = match kind {
                LossKind::Labels => {
                    self.classification
                        .forward(outputs, targets, assignment, self.label_mode())?
                }
                LossKind::Boxes => self
                    .boxes
                    .forward(outputs, targets, assignment, num_interactions)?,
                LossKind::Confidences => self.confidences.forward(outputs, assignment)?,
                LossKind::Masks => self.masks.forward(outputs, targets, assignment)?,
            };
            Ok(losses)
        }

        /// Compute the losses of the last layer and the box and confidence
        /// losses of every intermediate layer.
        ///
        /// Keys of intermediate layers are suffixed by `_<layer_index>`. The
        /// assignment of the last layer is returned along.
        pub fn forward(
            &self,
            outputs: &PredictionOutput,
            targets: &[TargetRecord],
        ) -> Result<(LossMap, Assignment)> {
            let mut timing = Timing::new("set_criterion");

            let assignment = self.match_outputs(outputs, targets)?;
            timing.add_event("match_outputs");

            let num_interactions = self.num_interactions(targets, outputs.device()?)?;
            debug!("normalize box losses by {} interactions", num_interactions);
            timing.add_event("num_interactions");

            let mut losses = LossMap::new();
            for &kind in &self.losses {
                let part = self
                    .get_loss(kind, outputs, targets, &assignment, num_interactions)
                    .with_context(|| format!("failed to compute '{}' loss", kind))?;
                losses.extend(part);
            }
            timing.add_event("losses");

            for (layer_index, aux) in outputs.aux_outputs.iter().enumerate() {
                let aux_outputs = outputs.merge_aux(aux);
                let aux_assignment = self
                    .match_outputs(&aux_outputs, targets)
                    .with_context(|| format!("failed to match layer {}", layer_index))?;
                debug!(
                    "layer {} matched {} slots",
                    layer_index,
                    aux_assignment.num_matched()
                );

                for kind in LossKind::aux_kinds() {
                    let part = self
                        .get_loss(kind, &aux_outputs, targets, &aux_assignment, num_interactions)
                        .with_context(|| {
                            format!("failed to compute '{}' loss on layer {}", kind, layer_index)
                        })?;
                    losses.extend(suffix_keys(part, layer_index));
                }
            }
            timing.add_event("aux_losses");

            timing.report();
            Ok((losses, assignment))
        }

        fn match_outputs(
            &self,
            outputs: &PredictionOutput,
            targets: &[TargetRecord],
        ) -> Result<Assignment> {
            let assignment = self.matcher.match_outputs(outputs, targets)?;
            assignment.validate(targets, outputs.num_slots()?)?;
            Ok(assignment)
        }
    }
}
