use crate::common::*;

pub trait TensorExt {
    fn is_empty(&self) -> bool;

    fn f_sum_tensors<T>(tensors: impl IntoIterator<Item = T>) -> Result<Tensor>
    where
        T: Borrow<Tensor>,
    {
        let mut iter = tensors.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| format_err!("the input iterator must not be empty"))?
            .borrow()
            .shallow_clone();
        let sum = iter.try_fold(first, |lhs, rhs| lhs.f_add(rhs.borrow()))?;
        Ok(sum)
    }
}

impl TensorExt for Tensor {
    fn is_empty(&self) -> bool {
        self.numel() == 0
    }
}

/// A scalar zero that does not take part in backpropagation.
///
/// Loss functions return it when there is nothing to supervise, where a
/// mean reduction would otherwise produce NaN.
pub fn zero_loss(device: Device) -> Tensor {
    Tensor::zeros(&[], (Kind::Float, device)).set_requires_grad(false)
}
