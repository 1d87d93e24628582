use crate::{common::*, label::TargetRecord};

/// Matched slots and interactions of one image.
///
/// The i-th slot in `slots` is matched to the i-th interaction index in
/// `targets`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Getters)]
pub struct MatchedPair {
    #[get = "pub"]
    slots: Vec<i64>,
    #[get = "pub"]
    targets: Vec<i64>,
}

impl MatchedPair {
    pub fn new(slots: Vec<i64>, targets: Vec<i64>) -> Result<Self> {
        ensure!(
            slots.len() == targets.len(),
            "the number of slots ({}) and targets ({}) must be equal",
            slots.len(),
            targets.len()
        );
        ensure!(
            slots.iter().chain(&targets).all(|&index| index >= 0),
            "indexes must be non-negative"
        );
        ensure!(
            slots.iter().all_unique(),
            "slot indexes {:?} are not unique",
            slots
        );
        ensure!(
            targets.iter().all_unique(),
            "target indexes {:?} are not unique",
            targets
        );
        Ok(Self { slots, targets })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// One-to-one matching between predicted slots and ground truth
/// interactions, one entry per image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assignment {
    pairs: Vec<MatchedPair>,
}

impl Assignment {
    pub fn new(pairs: Vec<MatchedPair>) -> Self {
        Self { pairs }
    }

    /// Build from per-image `(slots, targets)` index lists.
    pub fn from_indices<I>(indices: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Vec<i64>, Vec<i64>)>,
    {
        let pairs = indices
            .into_iter()
            .map(|(slots, targets)| MatchedPair::new(slots, targets))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[MatchedPair] {
        &self.pairs
    }

    pub fn batch_size(&self) -> usize {
        self.pairs.len()
    }

    /// Total number of matched slots over the batch.
    pub fn num_matched(&self) -> usize {
        self.pairs.iter().map(|pair| pair.len()).sum()
    }

    /// Batch and slot coordinates of matched predictions, in assignment
    /// order.
    pub fn src_permutation(&self) -> PermutationIndex {
        PermutationIndex::from_groups(self.pairs.iter().map(|pair| pair.slots()))
    }

    /// Batch and interaction coordinates of matched targets, in assignment
    /// order.
    pub fn tgt_permutation(&self) -> PermutationIndex {
        PermutationIndex::from_groups(self.pairs.iter().map(|pair| pair.targets()))
    }

    /// Iterate over `(target record, interaction index)` of every matched
    /// slot, in assignment order.
    pub fn matched_targets<'a>(
        &'a self,
        targets: &'a [TargetRecord],
    ) -> impl Iterator<Item = (&'a TargetRecord, i64)> + 'a {
        self.pairs
            .iter()
            .zip(targets)
            .flat_map(|(pair, target)| pair.targets().iter().map(move |&index| (target, index)))
    }

    /// Check the assignment against the batch it was computed for.
    pub fn validate(&self, targets: &[TargetRecord], num_slots: i64) -> Result<()> {
        ensure!(
            self.batch_size() == targets.len(),
            "the assignment covers {} images, but the batch has {}",
            self.batch_size(),
            targets.len()
        );

        self.pairs
            .iter()
            .zip(targets)
            .enumerate()
            .try_for_each(|(batch_index, (pair, target))| -> Result<_> {
                ensure!(
                    pair.slots().iter().all(|&slot| slot < num_slots),
                    "slot indexes {:?} of image {} exceed the number of slots {}",
                    pair.slots(),
                    batch_index,
                    num_slots
                );
                ensure!(
                    pair.targets()
                        .iter()
                        .all(|&index| (index as usize) < target.num_hois()),
                    "target indexes {:?} of image {} exceed the number of interactions {}",
                    pair.targets(),
                    batch_index,
                    target.num_hois()
                );
                Ok(())
            })
    }
}

impl FromIterator<MatchedPair> for Assignment {
    fn from_iter<T: IntoIterator<Item = MatchedPair>>(iter: T) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}
