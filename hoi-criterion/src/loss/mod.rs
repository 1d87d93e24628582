//! Loss computation over matched predictions.

mod assignment;
mod boxes;
mod config;
mod confidences;
mod criterion;
mod distributed;
mod label_resolver;
mod labels;
mod masks;
mod matcher;
mod misc;
mod weights;

pub use assignment::*;
pub use boxes::*;
pub use config::*;
pub use confidences::*;
pub use criterion::*;
pub use distributed::*;
pub use label_resolver::*;
pub use labels::*;
pub use masks::*;
pub use matcher::*;
pub use misc::*;
pub use weights::*;
