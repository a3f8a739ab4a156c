//! Try-on session state
//!
//! All user-visible session state lives in [`Session`]. It only changes
//! through [`Session::apply`], which consumes the old state and an event and
//! returns the new state plus the notices the user should see.

use serde::Serialize;

use crate::config::{CameraConfig, Facing};
use crate::error::CameraError;

/// A message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "message", rename_all = "lowercase")]
pub enum Notice {
    /// Replaces the persistent status line
    Status(String),
    /// Short-lived popup
    Toast(String),
    /// Error banner
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Self::Status(m) | Self::Toast(m) | Self::Error(m) => m,
        }
    }
}

/// Things that happen to a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CameraStarting,
    CameraStarted { fallback: bool },
    CameraFailed(CameraError),
    CameraStopped,
    ToggleMirror,
    SwitchFacing,
    VariantLoading { id: String, name: String },
    VariantLoaded { id: String, name: String, fallback: bool },
    FaceDetected,
    FaceLost,
    CaptureRefused,
    CaptureSaved { filename: String },
    CaptureFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub camera_active: bool,
    pub facing: Facing,
    pub mirrored: bool,
    pub face_detected: bool,
    pub current_variant: Option<String>,
    pub last_error: Option<String>,
}

impl Session {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            camera_active: false,
            facing: config.facing,
            mirrored: config.mirrored,
            face_detected: false,
            current_variant: None,
            last_error: None,
        }
    }

    pub fn apply(self, event: &SessionEvent) -> (Self, Vec<Notice>) {
        let status = |m: &str| Notice::Status(m.to_string());
        let toast = |m: &str| Notice::Toast(m.to_string());

        match event {
            SessionEvent::CameraStarting => (self, vec![status("Starting camera...")]),

            SessionEvent::CameraStarted { fallback } => {
                let mut notices = Vec::new();
                if *fallback {
                    notices.push(toast(CameraError::Overconstrained(String::new()).user_message()));
                }
                notices.push(status("Looking for face..."));
                notices.push(toast("Camera started successfully"));

                let next = Self {
                    camera_active: true,
                    face_detected: false,
                    last_error: None,
                    ..self
                };
                (next, notices)
            }

            SessionEvent::CameraFailed(error) => {
                let message = error.user_message().to_string();
                let next = Self {
                    camera_active: false,
                    face_detected: false,
                    last_error: Some(message.clone()),
                    ..self
                };
                (next, vec![Notice::Error(message), status("Camera error")])
            }

            SessionEvent::CameraStopped => {
                let next = Self {
                    camera_active: false,
                    face_detected: false,
                    ..self
                };
                (next, vec![status("Camera stopped"), toast("Camera stopped")])
            }

            SessionEvent::ToggleMirror => {
                let mirrored = !self.mirrored;
                let message = if mirrored { "Mirror enabled" } else { "Mirror disabled" };
                (Self { mirrored, ..self }, vec![toast(message)])
            }

            SessionEvent::SwitchFacing => {
                let facing = self.facing.toggled();
                let message = match facing {
                    Facing::User => "Switched to front camera",
                    Facing::Environment => "Switched to back camera",
                };
                (Self { facing, ..self }, vec![toast(message)])
            }

            SessionEvent::VariantLoading { name, .. } => {
                (self, vec![Notice::Status(format!("Loading {}...", name))])
            }

            SessionEvent::VariantLoaded { id, name, fallback } => {
                let notice = if *fallback {
                    Notice::Error(format!("Failed to load {}. Using placeholder.", name))
                } else {
                    Notice::Toast(format!("{} loaded", name))
                };
                let next = Self {
                    current_variant: Some(id.clone()),
                    ..self
                };
                (next, vec![notice])
            }

            SessionEvent::FaceDetected => {
                if self.face_detected || !self.camera_active {
                    return (self, Vec::new());
                }
                let next = Self {
                    face_detected: true,
                    last_error: None,
                    ..self
                };
                (
                    next,
                    vec![
                        status("Face detected - Tracking active"),
                        toast("Perfect fit! Adjust your position if needed"),
                    ],
                )
            }

            SessionEvent::FaceLost => {
                if !self.face_detected {
                    return (self, Vec::new());
                }
                let next = Self {
                    face_detected: false,
                    ..self
                };
                (
                    next,
                    vec![
                        status("Face lost - Looking for face..."),
                        toast("Position your face in the circle"),
                    ],
                )
            }

            SessionEvent::CaptureRefused => (self, vec![toast("Please position your face first")]),

            SessionEvent::CaptureSaved { filename } => {
                tracing::debug!("Screenshot ready: {}", filename);
                (self, vec![toast("Screenshot downloaded")])
            }

            SessionEvent::CaptureFailed => (self, vec![toast("Failed to capture screenshot")]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(&CameraConfig::default())
    }

    #[test]
    fn test_start_then_face() {
        let (s, notices) = session().apply(&SessionEvent::CameraStarted { fallback: false });
        assert!(s.camera_active);
        assert_eq!(notices[0], Notice::Status("Looking for face...".into()));

        let (s, notices) = s.apply(&SessionEvent::FaceDetected);
        assert!(s.face_detected);
        assert_eq!(notices.len(), 2);

        // Repeated detections are silent
        let (s, notices) = s.apply(&SessionEvent::FaceDetected);
        assert!(notices.is_empty());

        let (s, notices) = s.apply(&SessionEvent::FaceLost);
        assert!(!s.face_detected);
        assert_eq!(notices[0].message(), "Face lost - Looking for face...");
    }

    #[test]
    fn test_permission_denied() {
        let (s, notices) = session().apply(&SessionEvent::CameraFailed(CameraError::PermissionDenied));
        assert!(!s.camera_active);
        assert_eq!(
            notices[0],
            Notice::Error("Camera access denied. Please allow camera access in browser settings.".into())
        );
        assert!(s.last_error.is_some());
    }

    #[test]
    fn test_face_ignored_while_camera_off() {
        let (s, notices) = session().apply(&SessionEvent::FaceDetected);
        assert!(!s.face_detected);
        assert!(notices.is_empty());
    }

    #[test]
    fn test_stop_clears_face() {
        let (s, _) = session().apply(&SessionEvent::CameraStarted { fallback: false });
        let (s, _) = s.apply(&SessionEvent::FaceDetected);
        let (s, notices) = s.apply(&SessionEvent::CameraStopped);
        assert!(!s.camera_active);
        assert!(!s.face_detected);
        assert_eq!(notices[1], Notice::Toast("Camera stopped".into()));
    }

    #[test]
    fn test_toggle_mirror() {
        let (s, notices) = session().apply(&SessionEvent::ToggleMirror);
        assert!(!s.mirrored);
        assert_eq!(notices[0].message(), "Mirror disabled");
        let (s, notices) = s.apply(&SessionEvent::ToggleMirror);
        assert!(s.mirrored);
        assert_eq!(notices[0].message(), "Mirror enabled");
    }

    #[test]
    fn test_switch_facing() {
        let (s, _) = session().apply(&SessionEvent::SwitchFacing);
        assert_eq!(s.facing, Facing::Environment);
    }

    #[test]
    fn test_variant_notices() {
        let (s, notices) = session().apply(&SessionEvent::VariantLoaded {
            id: "sport".into(),
            name: "Sport".into(),
            fallback: true,
        });
        assert_eq!(s.current_variant.as_deref(), Some("sport"));
        assert_eq!(
            notices[0],
            Notice::Error("Failed to load Sport. Using placeholder.".into())
        );

        let (_, notices) = s.apply(&SessionEvent::VariantLoaded {
            id: "retro".into(),
            name: "Retro".into(),
            fallback: false,
        });
        assert_eq!(notices[0], Notice::Toast("Retro loaded".into()));
    }

    #[test]
    fn test_overconstrained_fallback_start() {
        let (s, notices) = session().apply(&SessionEvent::CameraStarted { fallback: true });
        assert!(s.camera_active);
        assert_eq!(notices[0].message(), "Camera cannot meet requirements. Trying fallback...");
    }

    #[test]
    fn test_notice_serialization() {
        let json = serde_json::to_value(Notice::Toast("hi".into())).unwrap();
        assert_eq!(json, serde_json::json!({"level": "toast", "message": "hi"}));
    }
}
