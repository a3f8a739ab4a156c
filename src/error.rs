//! Error types for Tryon3D

use thiserror::Error;

/// Main error type for Tryon3D
#[derive(Error, Debug)]
pub enum Tryon3dError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Model loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Camera acquisition errors.
///
/// Each variant maps to a distinct user-facing message; see [`CameraError::user_message`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No camera device found")]
    NotFound,

    #[error("Camera device is busy")]
    DeviceBusy,

    #[error("Camera cannot satisfy constraints: {0}")]
    Overconstrained(String),

    #[error("Camera failure: {0}")]
    Other(String),
}

impl CameraError {
    /// Classify a raw device or helper-process error line.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("permission denied") || lower.contains("not allowed") {
            Self::PermissionDenied
        } else if lower.contains("no such file")
            || lower.contains("no such device")
            || lower.contains("not found")
        {
            Self::NotFound
        } else if lower.contains("busy") || lower.contains("in use") {
            Self::DeviceBusy
        } else if lower.contains("unsupported")
            || lower.contains("not supported")
            || lower.contains("invalid argument")
            || lower.contains("overconstrained")
        {
            Self::Overconstrained(message.trim().to_string())
        } else {
            Self::Other(message.trim().to_string())
        }
    }

    /// Message shown to the user for this failure
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Camera access denied. Please allow camera access in browser settings."
            }
            Self::NotFound => "No camera found. Please connect a camera.",
            Self::DeviceBusy => "Camera is in use by another application.",
            Self::Overconstrained(_) => "Camera cannot meet requirements. Trying fallback...",
            Self::Other(_) => "Cannot access camera. Please check permissions.",
        }
    }
}

/// 3D model loading errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoaderError {
    #[error("HTTP {status} fetching {url}")]
    Http { url: String, status: u16 },

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Failed to parse model from {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Model from {0} contains no geometry")]
    EmptyModel(String),

    #[error("Unknown variant: {0}")]
    UnknownVariant(String),
}

/// Tracking-related errors (detector transport + landmark validation)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    #[error("Detector receiver error: {0}")]
    Receiver(String),

    #[error("Detector packet parse error: {0}")]
    Parse(String),

    #[error("Landmark {0} missing from landmark set")]
    MissingLandmark(usize),

    #[error("Landmark {0} has non-finite coordinates")]
    NonFiniteLandmark(usize),
}

/// Screenshot capture errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("No face detected, nothing to capture")]
    NoFace,

    #[error("Frame buffer size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode PNG: {0}")]
    Encode(String),

    #[error("Invalid watermark font: {0}")]
    Font(String),
}

/// Result type alias for Tryon3D operations
pub type Result<T> = std::result::Result<T, Tryon3dError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_camera_errors() {
        assert_eq!(
            CameraError::classify("open /dev/video0: Permission denied"),
            CameraError::PermissionDenied
        );
        assert_eq!(
            CameraError::classify("can't open camera: No such device"),
            CameraError::NotFound
        );
        assert_eq!(
            CameraError::classify("VIDIOC_STREAMON: Device or resource busy"),
            CameraError::DeviceBusy
        );
        assert!(matches!(
            CameraError::classify("1920x1080@60 not supported"),
            CameraError::Overconstrained(_)
        ));
        assert!(matches!(
            CameraError::classify("segfault"),
            CameraError::Other(_)
        ));
    }

    #[test]
    fn test_classify_helper_device_lines() {
        assert_eq!(
            CameraError::classify("Permission denied: /dev/video0"),
            CameraError::PermissionDenied
        );
        assert_eq!(
            CameraError::classify("No such device: /dev/video2"),
            CameraError::NotFound
        );
        assert_eq!(
            CameraError::classify("Device or resource busy: /dev/video0"),
            CameraError::DeviceBusy
        );
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let errors = [
            CameraError::PermissionDenied,
            CameraError::NotFound,
            CameraError::DeviceBusy,
            CameraError::Overconstrained(String::new()),
            CameraError::Other(String::new()),
        ];
        for (i, a) in errors.iter().enumerate() {
            for b in errors.iter().skip(i + 1) {
                assert_ne!(a.user_message(), b.user_message());
            }
        }
    }
}
