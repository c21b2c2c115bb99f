//! Half-marathon finish-time prediction from a free-text runner description.
//!
//! text → [`extract`] → [`validate`] → [`features`] → [`predict`] →
//! [`chart`], driven by [`pipeline::Pipeline`].

pub mod chart;
pub mod config;
pub mod error;
pub mod extract;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod reference;
pub mod store;
pub mod types;
pub mod validate;

pub use error::{Field, PipelineError};
pub use pipeline::{Failure, Pipeline, Report, Stage};
pub use types::{
    Category, Confirmation, FeatureRow, PredictedRow, Prediction, RawExtraction, Sex,
    ValidatedAttributes,
};
