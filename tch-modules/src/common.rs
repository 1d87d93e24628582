pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use derivative::Derivative;
pub use std::collections::HashSet;
pub use tch::{Device, Kind, Reduction, Tensor};
pub use tch_goodies::{zero_loss, TensorExt};
