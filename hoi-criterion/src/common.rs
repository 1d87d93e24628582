pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use derivative::Derivative;
pub use getset::Getters;
pub use indexmap::{IndexMap, IndexSet};
pub use itertools::{izip, Itertools as _};
pub use lazy_static::lazy_static;
pub use log::{debug, info, warn};
pub use noisy_float::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    borrow::Borrow,
    collections::{HashMap, HashSet},
    fmt::Debug,
    iter,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
pub use tch::{Device, IndexOp, Kind, Reduction, Tensor};
pub use tch_goodies::{zero_loss, CxCyWHTensor, PermutationIndex, TensorExt as _};
pub use tch_tensor_like::TensorLike;
