//! Loss function building blocks on top of tch.

mod bce_with_logits_loss;
mod common;
mod cross_entropy;
mod focal_loss;
mod masked_cross_entropy;

pub use bce_with_logits_loss::*;
pub use cross_entropy::*;
pub use focal_loss::*;
pub use masked_cross_entropy::*;
