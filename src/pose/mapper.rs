//! Landmark-to-pose mapping
//!
//! Turns one frame of normalized face landmarks into a scene-space position,
//! uniform scale and rotation for the glasses overlay.
//!
//! Scene space is centered on the image center with +y up; the image spans
//! `x_range` horizontally and `y_range` vertically. Depth grows with the
//! inter-eye distance (a closer face has wider-set eyes in the image).

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::{GapPolicy, PoseConfig, SmoothingMode};
use crate::error::TrackingError;
use crate::pose::smoothing::ExponentialSmoother;
use crate::tracking::landmarks::{distance, facemesh, midpoint, Landmark, LandmarkSet};

/// Overlay transform for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub scale: f32,
    /// (pitch, yaw, roll) in radians
    pub rotation: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: 1.0,
            rotation: Vec3::ZERO,
        }
    }
}

/// Result of mapping one frame
#[derive(Debug, Clone, PartialEq)]
pub enum PoseUpdate {
    /// A face was found; show the overlay here
    Visible(Pose),
    /// No face this frame; hide the overlay
    Hidden,
    /// The face was unusable; keep the previous transform
    Skipped(TrackingError),
}

/// Raw (unsmoothed) measurements for one face
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceTarget {
    pub eye_distance: f32,
    pub position: Vec3,
    pub scale: f32,
    pub rotation: Vec3,
    /// Nose-bridge correction, applied on top of the smoothed position
    pub bridge_offset: Vec3,
}

/// 2D distance between the two eye landmarks
pub fn inter_eye_distance(face: &LandmarkSet) -> Result<f32, TrackingError> {
    let left = face.require(facemesh::LEFT_EYE)?;
    let right = face.require(facemesh::RIGHT_EYE)?;
    Ok(distance(&left, &right))
}

/// Map the eye center and inter-eye distance to a scene position
pub fn map_to_scene(center: &Landmark, eye_distance: f32, mirrored: bool, config: &PoseConfig) -> Vec3 {
    let sign = if mirrored { -1.0 } else { 1.0 };
    let origin = Vec3::from(config.origin);

    Vec3::new(
        (center.x - 0.5) * config.x_range * sign,
        -(center.y - 0.5) * config.y_range,
        (eye_distance - config.depth_reference) * config.depth_gain,
    ) + origin
}

/// Head rotation (pitch, yaw, roll) with gains applied, excluding the asset base rotation
pub fn head_rotation(face: &LandmarkSet, mirrored: bool, config: &PoseConfig) -> Result<Vec3, TrackingError> {
    let left_outer = face.require(facemesh::LEFT_EYE_OUTER)?;
    let right_outer = face.require(facemesh::RIGHT_EYE_OUTER)?;
    let left_ear = face.require(facemesh::LEFT_EAR)?;
    let right_ear = face.require(facemesh::RIGHT_EAR)?;
    let forehead = face.require(facemesh::FOREHEAD)?;
    let nose_tip = face.require(facemesh::NOSE_TIP)?;

    // Image y points down, scene y points up
    let eye_line = right_outer.xy() - left_outer.xy();
    let roll = -eye_line.y.atan2(eye_line.x) * config.roll_gain;

    let yaw = (right_ear.z - left_ear.z).atan2(right_ear.x - left_ear.x) * config.yaw_gain;

    let down = nose_tip.xyz() - forehead.xyz();
    let pitch = down.z.atan2(down.y) * config.pitch_gain;

    let sign = if mirrored { -1.0 } else { 1.0 };
    Ok(Vec3::new(pitch, yaw * sign, roll * sign))
}

/// Stateful mapper: measures each frame and smooths position and scale across frames
#[derive(Debug, Clone)]
pub struct PoseMapper {
    config: PoseConfig,
    position: ExponentialSmoother<Vec3>,
    scale: ExponentialSmoother<f32>,
}

impl PoseMapper {
    pub fn new(config: &PoseConfig) -> Self {
        let factor = match config.smoothing {
            SmoothingMode::Exponential => config.smoothing_factor,
            SmoothingMode::None => 1.0,
        };

        Self {
            config: config.clone(),
            position: ExponentialSmoother::new(factor),
            scale: ExponentialSmoother::new(factor),
        }
    }

    pub fn config(&self) -> &PoseConfig {
        &self.config
    }

    /// Measure a face without touching smoothing state
    pub fn measure(&self, face: &LandmarkSet, mirrored: bool) -> Result<FaceTarget, TrackingError> {
        let left = face.require(facemesh::LEFT_EYE)?;
        let right = face.require(facemesh::RIGHT_EYE)?;
        let bridge = face.require(facemesh::NOSE_BRIDGE)?;

        let eye_distance = distance(&left, &right);
        let center = midpoint(&left, &right);
        let rotation = head_rotation(face, mirrored, &self.config)? + Vec3::from(self.config.base_rotation);

        let bridge_offset = Vec3::new(
            0.0,
            -(bridge.y - center.y) * self.config.nose_bridge_y_gain,
            (bridge.x - center.x) * self.config.nose_bridge_z_gain,
        );

        Ok(FaceTarget {
            eye_distance,
            position: map_to_scene(&center, eye_distance, mirrored, &self.config),
            scale: eye_distance * self.config.scale_factor,
            rotation,
            bridge_offset,
        })
    }

    /// Map one detector result. `None` means no face this frame.
    pub fn update(&mut self, face: Option<&LandmarkSet>, mirrored: bool) -> PoseUpdate {
        let Some(face) = face else {
            if self.config.gap_policy == GapPolicy::Reset {
                self.reset();
            }
            return PoseUpdate::Hidden;
        };

        let target = match self.measure(face, mirrored) {
            Ok(target) => target,
            Err(e) => {
                tracing::debug!("Skipping frame: {}", e);
                return PoseUpdate::Skipped(e);
            }
        };

        let position = self.position.update(target.position);
        let scale = self.scale.update(target.scale);

        PoseUpdate::Visible(Pose {
            position: position + target.bridge_offset,
            scale,
            rotation: target.rotation,
        })
    }

    /// Drop smoothing state
    pub fn reset(&mut self) {
        self.position.reset();
        self.scale.reset();
    }

    pub fn is_tracking(&self) -> bool {
        self.position.value().is_some()
    }
}
