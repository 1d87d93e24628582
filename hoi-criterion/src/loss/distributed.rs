use crate::common::*;

/// Collective operations across processes.
pub trait DistributedReduce {
    /// Sum the tensor across all processes in place.
    fn all_reduce(&self, tensor: &mut Tensor) -> Result<()>;

    /// The number of participating processes.
    fn world_size(&self) -> usize;
}

/// The single process setting, where reduction is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProcess;

impl DistributedReduce for LocalProcess {
    fn all_reduce(&self, _tensor: &mut Tensor) -> Result<()> {
        Ok(())
    }

    fn world_size(&self) -> usize {
        1
    }
}
