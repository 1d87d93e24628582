//! Tensor helpers shared by the HOI criterion crates.

mod common;
pub mod compound_tensor;
pub mod permutation;
pub mod tensor;
pub mod utils;

pub use compound_tensor::*;
pub use permutation::*;
pub use tensor::*;
pub use utils::*;
