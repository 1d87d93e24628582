//! Set-prediction loss for human-object interaction detection.
//!
//! The [loss::SetCriterion] matches predicted interaction slots to ground
//! truth interactions with an external [loss::Matcher], then computes the
//! classification, box, confidence and region mask losses over the
//! assignment.

mod common;
pub mod label;
pub mod loss;
pub mod model;
pub mod profiling;
