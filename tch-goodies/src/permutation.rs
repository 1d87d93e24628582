use crate::common::*;

/// Flattened coordinates of matched elements across a batch.
///
/// `batches[k]` tells the image the k-th matched element belongs to and
/// `indexes[k]` its position within that image. Both are 1-D int64 tensors
/// of equal length, usable directly for advanced indexing into
/// `[batch, slots, ...]` tensors.
#[derive(Debug, TensorLike)]
pub struct PermutationIndex {
    pub batches: Tensor,
    pub indexes: Tensor,
}

impl PermutationIndex {
    /// Build the index from per-image groups of positions, in batch order.
    pub fn from_groups<I, G>(groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: AsRef<[i64]>,
    {
        let (batches, indexes): (Vec<i64>, Vec<i64>) = groups
            .into_iter()
            .enumerate()
            .flat_map(|(batch_index, group)| {
                let batch_index = batch_index as i64;
                group
                    .as_ref()
                    .iter()
                    .map(|&index| (batch_index, index))
                    .collect::<Vec<_>>()
            })
            .unzip();

        Self {
            batches: Tensor::of_slice(&batches),
            indexes: Tensor::of_slice(&indexes),
        }
    }

    pub fn num_samples(&self) -> i64 {
        self.batches.numel() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    pub fn device(&self) -> Device {
        self.batches.device()
    }

    pub fn to_device(&self, device: Device) -> Self {
        Self {
            batches: self.batches.to_device(device),
            indexes: self.indexes.to_device(device),
        }
    }

    /// Pick the matched rows out of a `[batch, slots, ...]` tensor.
    ///
    /// The output has shape `[num_samples, ...]` and follows the index order.
    pub fn f_gather(&self, input: &Tensor) -> Result<Tensor> {
        ensure!(
            input.dim() >= 2,
            "expect a tensor with at least two dimensions, but get shape {:?}",
            input.size()
        );
        let Self { batches, indexes } = self.to_device(input.device());
        let output = input.f_index(&[Some(&batches), Some(&indexes)])?;
        Ok(output)
    }

    /// Pick the per-image entry of a `[batch, ...]` tensor for every
    /// matched element.
    pub fn f_gather_batch(&self, input: &Tensor) -> Result<Tensor> {
        let batches = self.batches.to_device(input.device());
        let output = input.f_index_select(0, &batches)?;
        Ok(output)
    }

    /// Write `values` into the matched positions of a `[batch, slots, ...]`
    /// tensor in place.
    pub fn f_scatter_(&self, output: &mut Tensor, values: &Tensor) -> Result<()> {
        let Self { batches, indexes } = self.to_device(output.device());
        let _ = output.f_index_put_(&[Some(&batches), Some(&indexes)], values, false)?;
        Ok(())
    }
}
