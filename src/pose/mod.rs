//! Pose module
//!
//! Maps face landmarks to the overlay transform.

pub mod mapper;
pub mod smoothing;

pub use mapper::{inter_eye_distance, map_to_scene, Pose, PoseMapper, PoseUpdate};
pub use smoothing::ExponentialSmoother;
