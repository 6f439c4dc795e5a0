#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Anatomical segment reference frames.
pub mod anatomy;

/// Marker cluster frames and templates.
pub mod cluster;

/// Error types for the kinematics module.
pub mod error;

/// Joint angles and translations between two segments.
pub mod joint;

/// Batched linear algebra over the time axis.
pub mod linalg;

/// Marker trajectories and local templates.
pub mod markers;

/// Frame-wise execution helpers.
pub mod parallel;

/// Rigid-body registration (SVD / Kabsch).
pub mod registration;

/// Stylus tip reconstruction.
pub mod stylus;

/// Rigid transforms and change of reference frame.
pub mod transforms;

/// Sphere intersection and plane fitting.
pub mod trilateration;

pub use error::KineError;
pub use markers::{Markers, Template};
pub use transforms::RigidTransform;
