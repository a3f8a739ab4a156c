//! Per-frame pipeline
//!
//! Detector result -> pose mapper -> overlay state. Each stage checks the
//! shared [`ActiveFlag`] first, so stopping the camera halts work at the
//! next stage boundary without tearing anything down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::PoseConfig;
use crate::overlay::OverlayState;
use crate::pose::{PoseMapper, PoseUpdate};
use crate::tracking::DetectionResult;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct ActiveFlag(Arc<AtomicBool>);

impl ActiveFlag {
    pub fn new(active: bool) -> Self {
        Self(Arc::new(AtomicBool::new(active)))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, active: bool) {
        self.0.store(active, Ordering::Release);
    }
}

pub struct FramePipeline {
    mapper: PoseMapper,
    active: ActiveFlag,
}

impl FramePipeline {
    pub fn new(config: &PoseConfig, active: ActiveFlag) -> Self {
        Self {
            mapper: PoseMapper::new(config),
            active,
        }
    }

    /// Map one detection onto the current overlay state.
    ///
    /// Returns `None` when the pipeline is inactive; the caller must then leave the overlay alone.
    pub fn process(
        &mut self,
        detection: &DetectionResult,
        current: &OverlayState,
        mirrored: bool,
    ) -> Option<OverlayState> {
        if !self.active.is_active() {
            return None;
        }

        let update = self.mapper.update(detection.face.as_ref(), mirrored);

        if !self.active.is_active() {
            return None;
        }

        let next = match update {
            PoseUpdate::Visible(pose) => current.clone().with_pose(pose),
            PoseUpdate::Hidden => current.clone().hidden(),
            PoseUpdate::Skipped(_) => current.clone(),
        };

        Some(next.with_frame_id(detection.frame_id))
    }

    /// Forget smoothing history, e.g. after a camera restart
    pub fn reset(&mut self) {
        self.mapper.reset();
    }
}
