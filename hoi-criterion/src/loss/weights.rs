use super::{LossKind, LossMap};
use crate::common::*;

/// Coefficients to combine loss terms into the training objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    weights: IndexMap<String, R64>,
}

impl LossWeights {
    pub fn new(weights: IndexMap<String, R64>) -> Self {
        Self { weights }
    }

    pub fn get(&self, key: &str) -> Option<R64> {
        self.weights.get(key).cloned()
    }

    pub fn insert(&mut self, key: impl Into<String>, weight: R64) -> Option<R64> {
        self.weights.insert(key.into(), weight)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, R64)> {
        self.weights.iter().map(|(key, &weight)| (key.as_str(), weight))
    }

    /// Replicate the weights of losses computed on intermediate layers
    /// under the `_<layer_index>` keys, for `num_layers` layers.
    pub fn with_aux_layers(mut self, num_layers: usize) -> Self {
        let aux_keys: Vec<&str> = LossKind::aux_kinds()
            .iter()
            .flat_map(|kind| kind.keys().iter().cloned())
            .collect();
        let aux_weights: Vec<_> = (0..num_layers)
            .flat_map(|layer_index| {
                aux_keys
                    .iter()
                    .filter_map(|&key| {
                        let weight = self.get(key)?;
                        Some((format!("{}_{}", key, layer_index), weight))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        self.weights.extend(aux_weights);
        self
    }

    /// The weighted sum of losses over keys present in both maps.
    ///
    /// It fails if no key is shared.
    pub fn total_loss(&self, losses: &LossMap) -> Result<Tensor> {
        let terms: Vec<_> = losses
            .iter()
            .filter_map(|(key, loss)| {
                let weight = self.get(key)?;
                Some(loss * weight.raw())
            })
            .collect();
        ensure!(
            !terms.is_empty(),
            "none of the losses {:?} has a weight",
            losses.keys().collect::<Vec<_>>()
        );
        Tensor::f_sum_tensors(terms)
    }
}

impl Default for LossWeights {
    fn default() -> Self {
        let weights = [
            ("loss_ce", 1.0),
            ("loss_bbox", 5.0),
            ("loss_giou", 2.0),
            ("loss_conf", 1.0),
            ("loss_hum_mask", 1.0),
            ("loss_obj_mask", 1.0),
            ("loss_uni_mask", 1.0),
        ]
        .into_iter()
        .map(|(key, weight)| (key.to_string(), r64(weight)))
        .collect();
        Self { weights }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn aux_layers_test() {
        let weights = LossWeights::default().with_aux_layers(2);
        assert_eq!(weights.get("loss_bbox_0"), Some(r64(5.0)));
        assert_eq!(weights.get("loss_giou_1"), Some(r64(2.0)));
        assert_eq!(weights.get("loss_conf_1"), Some(r64(1.0)));
        assert_eq!(weights.get("loss_ce_0"), None);
        assert_eq!(weights.get("loss_bbox_2"), None);
        assert_eq!(weights.iter().count(), 7 + 2 * 3);
    }

    #[test]
    fn total_loss_test() -> Result<()> {
        let weights = LossWeights::default().with_aux_layers(1);

        let mut losses = LossMap::new();
        losses.insert("loss_ce".into(), Tensor::from(0.5));
        losses.insert("class_error".into(), Tensor::from(75.0));
        losses.insert("loss_bbox".into(), Tensor::from(0.1));
        losses.insert("loss_bbox_0".into(), Tensor::from(0.2));

        let total = weights.total_loss(&losses)?;
        assert_abs_diff_eq!(
            total.double_value(&[]),
            0.5 + 5.0 * 0.1 + 5.0 * 0.2,
            epsilon = 1e-9
        );

        let mut unweighted = LossMap::new();
        unweighted.insert("class_error".into(), Tensor::from(1.0));
        assert!(weights.total_loss(&unweighted).is_err());
        Ok(())
    }
}
