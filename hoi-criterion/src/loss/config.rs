use super::{FocalParams, LossKind, LossWeights, Matcher, SetCriterionInit};
use crate::common::*;

/// The loss configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The losses computed on the last decoder layer.
    pub losses: Vec<LossKind>,
    /// The confidence loss weight of unmatched slots, in range (0, 1].
    pub eos_coef: R64,
    /// Enables the binary focal classification loss.
    #[serde(default)]
    pub focal_loss: Option<FocalLossConfig>,
    /// Keep the global label space in training.
    #[serde(default)]
    pub consider_all: bool,
    /// The weight of each loss term. The weights of intermediate layers are
    /// derived from it.
    pub weights: IndexMap<String, R64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FocalLossConfig {
    pub alpha: R64,
    pub gamma: R64,
}

impl Config {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        let config: Self = json5::from_str(&text)
            .with_context(|| format!("failed to parse '{}'", path.display()))?;
        Ok(config)
    }

    pub fn criterion_init<M>(&self, matcher: M) -> SetCriterionInit
    where
        M: 'static + Matcher,
    {
        let Self {
            ref losses,
            eos_coef,
            focal_loss,
            consider_all,
            ..
        } = *self;

        SetCriterionInit {
            losses: losses.clone(),
            eos_coef: eos_coef.raw(),
            focal_loss: focal_loss.map(|FocalLossConfig { alpha, gamma }| FocalParams {
                alpha: alpha.raw(),
                gamma: gamma.raw(),
            }),
            consider_all,
            ..SetCriterionInit::new(matcher)
        }
    }

    pub fn loss_weights(&self, num_aux_layers: usize) -> LossWeights {
        LossWeights::new(self.weights.clone()).with_aux_layers(num_aux_layers)
    }
}
