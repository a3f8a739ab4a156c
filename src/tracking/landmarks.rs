//! Normalized face landmarks
//!
//! Points are positionally indexed with MediaPipe FaceMesh indices.
//! `x` and `y` are normalized to the frame (0.0–1.0, y grows downwards),
//! `z` is a relative depth on roughly the same scale as `x`.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::TrackingError;

/// FaceMesh landmark indices used by the pose mapper
pub mod facemesh {
    pub const NOSE_TIP: usize = 1;
    pub const FOREHEAD: usize = 10;
    pub const LEFT_EYE_OUTER: usize = 33;
    pub const LEFT_EYE: usize = 145;
    pub const NOSE_BRIDGE: usize = 168;
    pub const LEFT_EAR: usize = 234;
    pub const RIGHT_EYE_OUTER: usize = 263;
    pub const RIGHT_EYE: usize = 374;
    pub const RIGHT_EAR: usize = 454;

    /// Number of points in a refined FaceMesh result (468 + iris)
    pub const REFINED_LANDMARK_COUNT: usize = 478;
}

/// A single normalized landmark
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn xy(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn xyz(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f32; 3]> for Landmark {
    fn from(p: [f32; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

/// Landmarks of one detected face for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    /// Fetch a landmark that must be present and finite
    pub fn require(&self, index: usize) -> Result<Landmark, TrackingError> {
        let point = self
            .points
            .get(index)
            .copied()
            .ok_or(TrackingError::MissingLandmark(index))?;

        if !point.is_finite() {
            return Err(TrackingError::NonFiniteLandmark(index));
        }

        Ok(point)
    }

    /// Overwrite (or append up to) a landmark index. Mostly useful for building fixtures.
    pub fn set(&mut self, index: usize, point: Landmark) {
        if index >= self.points.len() {
            self.points.resize(index + 1, Landmark::default());
        }
        self.points[index] = point;
    }
}

impl From<Vec<[f32; 3]>> for LandmarkSet {
    fn from(raw: Vec<[f32; 3]>) -> Self {
        Self::new(raw.into_iter().map(Landmark::from).collect())
    }
}

/// Euclidean distance between two landmarks in the image plane
pub fn distance(a: &Landmark, b: &Landmark) -> f32 {
    a.xy().distance(b.xy())
}

/// Midpoint of two landmarks
pub fn midpoint(a: &Landmark, b: &Landmark) -> Landmark {
    Landmark::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0, (a.z + b.z) / 2.0)
}
