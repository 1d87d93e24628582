//! Checked tensors of batched box parameters.
//!
//! Every component is kept as a separate `[batch, 1]` tensor so that box
//! arithmetic reads like the scalar formulas.

mod cxcywh;
mod tlbr;

pub use cxcywh::*;
pub use tlbr::*;
