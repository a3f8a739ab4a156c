//! Tracking module
//!
//! Face landmark input for the pose mapper:
//! - landmark types and FaceMesh indices
//! - MediaPipe FaceMesh helper (JSON over UDP) and its subprocess
//! - the gate that paces detector submissions

pub mod gate;
pub mod landmarks;
pub mod mediapipe;
pub mod subprocess;

pub use gate::DetectionGate;
pub use landmarks::{Landmark, LandmarkSet};
pub use mediapipe::{DetectionResult, MpReceiver};
