//! Camera acquisition
//!
//! The capture device itself lives outside this crate (see
//! [`crate::tracking::subprocess::DetectorProcess`]); this module defines the
//! constraints we ask for and the retry policy when they cannot be met.

use serde::Serialize;
use std::future::Future;

use crate::config::{CameraConfig, Facing};
use crate::error::CameraError;

/// Requested capture parameters. `None` leaves the choice to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraConstraints {
    pub device: u32,
    pub facing: Facing,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub ideal_fps: Option<u32>,
    pub max_fps: Option<u32>,
}

impl CameraConstraints {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            device: config.device,
            facing: config.facing,
            width: Some(config.width),
            height: Some(config.height),
            ideal_fps: Some(config.ideal_fps),
            max_fps: Some(config.max_fps),
        }
    }

    /// Only the facing mode, nothing the device could refuse
    pub fn minimal(device: u32, facing: Facing) -> Self {
        Self {
            device,
            facing,
            width: None,
            height: None,
            ideal_fps: None,
            max_fps: None,
        }
    }

    pub fn with_facing(mut self, facing: Facing) -> Self {
        self.facing = facing;
        self
    }

    pub fn is_minimal(&self) -> bool {
        self.width.is_none() && self.height.is_none() && self.ideal_fps.is_none() && self.max_fps.is_none()
    }
}

/// Something that can open and close a camera stream
pub trait CameraSource: Send {
    fn open(
        &mut self,
        constraints: &CameraConstraints,
    ) -> impl Future<Output = Result<(), CameraError>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;

    fn is_open(&mut self) -> bool;
}

/// A successfully started camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraStart {
    pub constraints: CameraConstraints,
    /// The requested constraints were refused and minimal ones were used instead
    pub fallback: bool,
}

/// Open the camera, retrying once with minimal constraints if the device is overconstrained.
///
/// Every other failure is returned as-is without retrying.
pub async fn start_camera<S: CameraSource>(
    source: &mut S,
    constraints: CameraConstraints,
) -> Result<CameraStart, CameraError> {
    match source.open(&constraints).await {
        Ok(()) => Ok(CameraStart {
            constraints,
            fallback: false,
        }),
        Err(CameraError::Overconstrained(reason)) if !constraints.is_minimal() => {
            tracing::warn!("Camera overconstrained ({}), retrying with minimal constraints", reason);

            let minimal = CameraConstraints::minimal(constraints.device, constraints.facing);
            match source.open(&minimal).await {
                Ok(()) => Ok(CameraStart {
                    constraints: minimal,
                    fallback: true,
                }),
                Err(e) => {
                    tracing::error!("Camera fallback failed: {}", e);
                    Err(CameraError::Other(e.to_string()))
                }
            }
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedCamera {
        results: Vec<Result<(), CameraError>>,
        opened_with: Vec<CameraConstraints>,
        open: bool,
    }

    impl ScriptedCamera {
        fn new(results: Vec<Result<(), CameraError>>) -> Self {
            Self {
                results,
                opened_with: Vec::new(),
                open: false,
            }
        }
    }

    impl CameraSource for ScriptedCamera {
        async fn open(&mut self, constraints: &CameraConstraints) -> Result<(), CameraError> {
            self.opened_with.push(constraints.clone());
            let result = self.results.remove(0);
            self.open = result.is_ok();
            result
        }

        async fn close(&mut self) {
            self.open = false;
        }

        fn is_open(&mut self) -> bool {
            self.open
        }
    }

    #[test]
    fn test_constraints_from_config() {
        let c = CameraConstraints::from_config(&CameraConfig::default());
        assert_eq!(c.facing, Facing::User);
        assert_eq!(c.width, Some(1280));
        assert_eq!(c.height, Some(720));
        assert_eq!(c.ideal_fps, Some(30));
        assert_eq!(c.max_fps, Some(60));
        assert!(!c.is_minimal());
    }

    #[tokio::test]
    async fn test_start_ok() {
        let mut cam = ScriptedCamera::new(vec![Ok(())]);
        let start = start_camera(&mut cam, CameraConstraints::from_config(&CameraConfig::default()))
            .await
            .unwrap();
        assert!(!start.fallback);
        assert!(cam.is_open());
    }

    #[tokio::test]
    async fn test_overconstrained_falls_back_once() {
        let mut cam = ScriptedCamera::new(vec![
            Err(CameraError::Overconstrained("1280x720".into())),
            Ok(()),
        ]);
        let start = start_camera(&mut cam, CameraConstraints::from_config(&CameraConfig::default()))
            .await
            .unwrap();
        assert!(start.fallback);
        assert!(start.constraints.is_minimal());
        assert_eq!(cam.opened_with.len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_failure_is_generic() {
        let mut cam = ScriptedCamera::new(vec![
            Err(CameraError::Overconstrained("1280x720".into())),
            Err(CameraError::Overconstrained("anything".into())),
        ]);
        let err = start_camera(&mut cam, CameraConstraints::from_config(&CameraConfig::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, CameraError::Other(_)));
        assert_eq!(err.user_message(), "Cannot access camera. Please check permissions.");
    }

    #[tokio::test]
    async fn test_permission_denied_not_retried() {
        let mut cam = ScriptedCamera::new(vec![Err(CameraError::PermissionDenied)]);
        let err = start_camera(&mut cam, CameraConstraints::from_config(&CameraConfig::default()))
            .await
            .unwrap_err();
        assert_eq!(err, CameraError::PermissionDenied);
        assert_eq!(cam.opened_with.len(), 1);
        assert!(!cam.is_open());
    }
}
