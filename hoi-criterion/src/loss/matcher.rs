use super::Assignment;
use crate::{common::*, label::TargetRecord, model::PredictionOutput};

/// Computes the one-to-one assignment between predicted slots and ground
/// truth interactions.
///
/// Closures of the form `Fn(&PredictionOutput, &[TargetRecord]) ->
/// Result<Assignment>` implement this trait.
pub trait Matcher {
    fn match_outputs(
        &self,
        outputs: &PredictionOutput,
        targets: &[TargetRecord],
    ) -> Result<Assignment>;
}

impl<F> Matcher for F
where
    F: Fn(&PredictionOutput, &[TargetRecord]) -> Result<Assignment>,
{
    fn match_outputs(
        &self,
        outputs: &PredictionOutput,
        targets: &[TargetRecord],
    ) -> Result<Assignment> {
        self(outputs, targets)
    }
}

/// Matches the i-th interaction of every image to the i-th slot.
///
/// It is mostly useful in tests and for pre-aligned predictions.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMatcher;

impl Matcher for IdentityMatcher {
    fn match_outputs(
        &self,
        outputs: &PredictionOutput,
        targets: &[TargetRecord],
    ) -> Result<Assignment> {
        let (_batch_size, num_slots, _num_classes) = outputs.logits_per_hoi()?.size3()?;

        targets
            .iter()
            .enumerate()
            .map(|(batch_index, target)| {
                let num_hois = target.num_hois() as i64;
                ensure!(
                    num_hois <= num_slots,
                    "image {} has {} interactions, more than the {} slots",
                    batch_index,
                    num_hois,
                    num_slots
                );
                let indexes: Vec<i64> = (0..num_hois).collect();
                Ok((indexes.clone(), indexes))
            })
            .collect::<Result<Vec<_>>>()
            .and_then(Assignment::from_indices)
    }
}
