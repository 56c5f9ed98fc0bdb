//! Composite pipelines built from the kernels in [`crate::ops`] and
//! [`crate::random`].
//!
//! A composite owns its children by value and encodes them in dependency
//! order, so one `encode` is one complete step.

pub mod gmm;
pub mod kmeans;

pub use gmm::GaussianMixtureSampler;
pub use kmeans::KMeans;
