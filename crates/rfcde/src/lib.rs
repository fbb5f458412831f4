//! Random forests for conditional density estimation (RFCDE).
//!
//! Trees split on the loss of an orthonormal basis expansion of the
//! responses, so each partition sharpens the estimate of the whole
//! conditional distribution rather than its mean. A fitted forest turns a
//! query point into per-observation neighbor weights; weighted estimators
//! over the training responses then give densities, means, or quantiles.
//!
//! Functional covariates (curves, spectra) are supported by grouping
//! adjacent raw columns into randomly sized blocks that are split on their
//! sum. Training is parallel over trees via rayon and reproducible for a
//! fixed seed.

mod basis;
mod bootstrap;
mod config;
mod error;
mod forest;
mod grouping;
mod importance;
mod matrix;
mod node;
mod oob;
mod predict;
mod result;
mod split;
mod tree;

pub use basis::{BasisSystem, ResponseBox};
pub use config::{ForestConfig, Mtry, OobMode};
pub use error::RfcdeError;
pub use forest::Forest;
pub use grouping::{CovariateGroup, FeatureGroups};
pub use importance::{ImportanceKind, RankedCovariate};
pub use matrix::{ColumnMajorMatrix, ColumnMajorView};
pub use node::{GroupIndex, IndexRange, Loss, Node, NodeIndex};
pub use oob::OobWeights;
pub use result::{ForestResult, TrainingMetadata};
pub use tree::{Tree, TreeConfig};
