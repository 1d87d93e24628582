//! Output format of the HOI detection model.
//!
//! The model itself lives elsewhere. The loss only reads these tensors.

use crate::common::*;

/// Predictions of the last decoder layer, together with the outputs of
/// earlier layers.
///
/// Every tensor is optional so that a missing output is reported by the
/// loss that needs it.
#[derive(Debug, Default)]
pub struct PredictionOutput {
    /// Interaction-to-text logits in shape `[batch, slots, classes]`.
    pub logits_per_hoi: Option<Tensor>,
    /// Subject and object boxes in shape `[batch, slots, 8]`, each half in
    /// normalized `(cx, cy, w, h)` format.
    pub pred_boxes: Option<Tensor>,
    /// Pre-sigmoid box confidences in shape `[batch, slots, 1]`.
    pub box_scores: Option<Tensor>,
    /// Pre-sigmoid human region logits in shape `[batch, height, width]`.
    pub hum_region: Option<Tensor>,
    /// Pre-sigmoid object region logits in shape `[batch, height, width]`.
    pub obj_region: Option<Tensor>,
    /// Pre-sigmoid union region logits in shape `[batch, height, width]`.
    pub uni_region: Option<Tensor>,
    /// Outputs of intermediate decoder layers, in layer order.
    pub aux_outputs: Vec<AuxOutput>,
}

/// Partial predictions of an intermediate decoder layer.
#[derive(Debug, Default)]
pub struct AuxOutput {
    pub pred_boxes: Option<Tensor>,
    pub box_scores: Option<Tensor>,
    pub hum_region: Option<Tensor>,
    pub obj_region: Option<Tensor>,
    pub uni_region: Option<Tensor>,
}

fn require<'a>(tensor: &'a Option<Tensor>, name: &str) -> Result<&'a Tensor> {
    tensor
        .as_ref()
        .ok_or_else(|| format_err!("the prediction output has no '{}'", name))
}

fn shallow_clone_opt(tensor: &Option<Tensor>) -> Option<Tensor> {
    tensor.as_ref().map(Tensor::shallow_clone)
}

impl PredictionOutput {
    pub fn logits_per_hoi(&self) -> Result<&Tensor> {
        require(&self.logits_per_hoi, "logits_per_hoi")
    }

    pub fn pred_boxes(&self) -> Result<&Tensor> {
        require(&self.pred_boxes, "pred_boxes")
    }

    pub fn box_scores(&self) -> Result<&Tensor> {
        require(&self.box_scores, "box_scores")
    }

    /// The human, object and union region logits.
    pub fn regions(&self) -> Result<(&Tensor, &Tensor, &Tensor)> {
        Ok((
            require(&self.hum_region, "hum_region")?,
            require(&self.obj_region, "obj_region")?,
            require(&self.uni_region, "uni_region")?,
        ))
    }

    pub fn has_regions(&self) -> bool {
        self.hum_region.is_some() && self.obj_region.is_some() && self.uni_region.is_some()
    }

    /// The number of prediction slots per image.
    pub fn num_slots(&self) -> Result<i64> {
        [&self.logits_per_hoi, &self.pred_boxes, &self.box_scores]
            .into_iter()
            .flatten()
            .map(|tensor| -> Result<_> {
                let (_batch_size, num_slots, _) = tensor.size3()?;
                Ok(num_slots)
            })
            .next()
            .unwrap_or_else(|| bail!("the prediction output has no per-slot tensor"))
    }

    /// The device of the first present output tensor.
    pub fn device(&self) -> Result<Device> {
        [
            &self.logits_per_hoi,
            &self.pred_boxes,
            &self.box_scores,
            &self.hum_region,
            &self.obj_region,
            &self.uni_region,
        ]
        .into_iter()
        .flatten()
        .map(|tensor| tensor.device())
        .next()
        .ok_or_else(|| format_err!("the prediction output contains no tensor"))
    }

    /// Build the view of an intermediate layer as a full prediction output.
    ///
    /// The layer does not predict classes, so the classification logits of
    /// the last layer are carried over. The returned value shares storage
    /// with `self` and `aux` but neither is modified.
    pub fn merge_aux(&self, aux: &AuxOutput) -> PredictionOutput {
        let AuxOutput {
            pred_boxes,
            box_scores,
            hum_region,
            obj_region,
            uni_region,
        } = aux;

        PredictionOutput {
            logits_per_hoi: shallow_clone_opt(&self.logits_per_hoi),
            pred_boxes: shallow_clone_opt(pred_boxes),
            box_scores: shallow_clone_opt(box_scores),
            hum_region: shallow_clone_opt(hum_region),
            obj_region: shallow_clone_opt(obj_region),
            uni_region: shallow_clone_opt(uni_region),
            aux_outputs: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_output_test() {
        let outputs = PredictionOutput::default();
        let err = outputs.pred_boxes().unwrap_err();
        assert!(err.to_string().contains("pred_boxes"));
        assert!(outputs.device().is_err());
        assert!(outputs.num_slots().is_err());
        assert!(outputs.regions().is_err());
        assert!(!outputs.has_regions());
    }

    #[test]
    fn merge_aux_test() -> Result<()> {
        let logits = Tensor::randn(&[2, 3, 5], (Kind::Float, Device::Cpu));
        let outputs = PredictionOutput {
            logits_per_hoi: Some(logits.shallow_clone()),
            pred_boxes: Some(Tensor::rand(&[2, 3, 8], (Kind::Float, Device::Cpu))),
            box_scores: Some(Tensor::randn(&[2, 3, 1], (Kind::Float, Device::Cpu))),
            aux_outputs: vec![AuxOutput {
                pred_boxes: Some(Tensor::zeros(&[2, 3, 8], (Kind::Float, Device::Cpu))),
                box_scores: Some(Tensor::zeros(&[2, 3, 1], (Kind::Float, Device::Cpu))),
                ..Default::default()
            }],
            ..Default::default()
        };

        let merged = outputs.merge_aux(&outputs.aux_outputs[0]);
        assert!(merged.logits_per_hoi()?.equal(&logits));
        assert_eq!(merged.pred_boxes()?.sum(Kind::Float).double_value(&[]), 0.0);
        assert!(merged.aux_outputs.is_empty());
        assert_eq!(merged.num_slots()?, 3);

        // the intermediate layer is left as it was
        assert!(outputs.aux_outputs[0].pred_boxes.is_some());
        assert!(outputs.aux_outputs[0].box_scores.is_some());
        assert!(!outputs.pred_boxes()?.equal(merged.pred_boxes()?));
        Ok(())
    }
}
