//! Overlay node state
//!
//! The transform and visibility of the glasses in the scene. Updated through
//! builder methods; every update produces a new value that is broadcast to
//! subscribers.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::pose::Pose;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayState {
    /// Whether the overlay is drawn
    visible: bool,
    /// Whether the most recent processed frame had a face
    face_detected: bool,
    position: Vec3,
    scale: f32,
    /// (pitch, yaw, roll) in radians
    rotation: Vec3,
    /// Currently selected variant
    variant_id: Option<String>,
    /// True while the variant's model is the placeholder
    placeholder: bool,
    /// Id of the detector frame this state came from
    frame_id: u64,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            visible: false,
            face_detected: false,
            position: Vec3::ZERO,
            scale: 1.0,
            rotation: Vec3::ZERO,
            variant_id: None,
            placeholder: false,
            frame_id: 0,
        }
    }
}

impl OverlayState {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn face_detected(&self) -> bool {
        self.face_detected
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn variant_id(&self) -> Option<&str> {
        self.variant_id.as_deref()
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            scale: self.scale,
            rotation: self.rotation,
        }
    }

    /// Show the overlay at a new pose
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.visible = true;
        self.face_detected = true;
        self.position = pose.position;
        self.scale = pose.scale;
        self.rotation = pose.rotation;
        self
    }

    /// No face: hide the overlay, keep the last transform
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self.face_detected = false;
        self
    }

    pub fn with_variant(mut self, variant_id: &str, placeholder: bool) -> Self {
        self.variant_id = Some(variant_id.to_string());
        self.placeholder = placeholder;
        self
    }

    pub fn with_frame_id(mut self, frame_id: u64) -> Self {
        self.frame_id = frame_id;
        self
    }
}
