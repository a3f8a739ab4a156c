//! Configuration parsing and management for Tryon3D

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Tryon3dError};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub pose: PoseConfig,
    pub render: RenderConfig,
    pub loader: LoaderConfig,
    pub catalog: CatalogConfig,
    pub capture: CaptureConfig,
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            detector: DetectorConfig::default(),
            pose: PoseConfig::default(),
            render: RenderConfig::default(),
            loader: LoaderConfig::default(),
            catalog: CatalogConfig::default(),
            capture: CaptureConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Tryon3dError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> Result<Self, Tryon3dError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, Tryon3dError> {
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Tryon3dError> {
        if !(self.pose.smoothing_factor > 0.0 && self.pose.smoothing_factor <= 1.0) {
            return Err(invalid(
                "pose.smoothing_factor",
                "Smoothing factor must be in (0.0, 1.0]",
            ));
        }

        if !(self.pose.scale_factor.is_finite() && self.pose.scale_factor > 0.0) {
            return Err(invalid("pose.scale_factor", "Scale factor must be positive"));
        }

        for (field, value) in [
            ("detector.min_detection_confidence", self.detector.min_detection_confidence),
            ("detector.min_tracking_confidence", self.detector.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "Confidence must be between 0.0 and 1.0"));
            }
        }

        if self.detector.max_faces != 1 {
            return Err(invalid(
                "detector.max_faces",
                "Only a single tracked face is supported",
            ));
        }

        if self.render.fps_limit == 0 {
            return Err(invalid("render.fps_limit", "FPS limit must be greater than 0"));
        }

        if self.catalog.variants.is_empty() {
            return Err(invalid("catalog.variants", "At least one variant is required"));
        }

        if !self
            .catalog
            .variants
            .iter()
            .any(|v| v.id == self.catalog.default_variant)
        {
            return Err(invalid(
                "catalog.default_variant",
                "Default variant must name one of catalog.variants",
            ));
        }

        if self.capture.watermark && !(self.capture.font_size.is_finite() && self.capture.font_size > 0.0) {
            return Err(invalid("capture.font_size", "Font size must be positive"));
        }

        if self.loader.max_attempts == 0 {
            return Err(invalid("loader.max_attempts", "At least one attempt is required"));
        }

        if self.detector.auto_launch {
            let path = Path::new(&self.detector.helper_script);
            if !path.exists() {
                tracing::warn!(
                    "Detector auto_launch enabled but helper script not found at: {}",
                    self.detector.helper_script
                );
            }
        }

        if self.http.port == 0 {
            return Err(invalid("http.port", "Port must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> Tryon3dError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Which physical camera to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Front ("selfie") camera
    User,
    /// Back camera
    Environment,
}

impl Default for Facing {
    fn default() -> Self {
        Self::User
    }
}

impl Facing {
    pub fn toggled(self) -> Self {
        match self {
            Self::User => Self::Environment,
            Self::Environment => Self::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Environment => "environment",
        }
    }
}

/// Camera capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Start the camera as soon as the service is up
    pub auto_start: bool,
    /// Camera device index handed to the detector helper
    pub device: u32,
    /// Requested facing mode
    pub facing: Facing,
    /// Ideal capture width
    pub width: u32,
    /// Ideal capture height
    pub height: u32,
    /// Ideal frame rate
    pub ideal_fps: u32,
    /// Maximum frame rate
    pub max_fps: u32,
    /// Start in mirrored ("selfie") mode
    pub mirrored: bool,
    /// How long a freshly launched capture process gets to fail before it counts as started
    pub startup_grace_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            auto_start: false,
            device: 0,
            facing: Facing::User,
            width: 1280,
            height: 720,
            ideal_fps: 30,
            max_fps: 60,
            mirrored: true,
            startup_grace_ms: 2000,
        }
    }
}

/// Face landmark detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Enable the detection pipeline
    pub enabled: bool,
    /// Local address to receive detector results on
    pub listen_address: String,
    /// Local UDP port to receive detector results on
    pub port: u16,
    /// UDP port the helper listens on for frame requests
    pub helper_port: u16,
    /// Launch the detector helper process when the camera starts
    pub auto_launch: bool,
    /// Path to the detector helper script
    pub helper_script: String,
    /// Maximum faces tracked (must be 1)
    pub max_faces: u32,
    /// Minimum confidence for initial face detection
    pub min_detection_confidence: f32,
    /// Minimum confidence for frame-to-frame tracking
    pub min_tracking_confidence: f32,
    /// Ask the detector for refined eye/iris landmarks
    pub refine_landmarks: bool,
    /// Minimum time between two frame submissions
    pub detection_interval_ms: u64,
    /// A request with no reply after this long is dropped
    pub response_timeout_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_address: "127.0.0.1".to_string(),
            port: 12346,
            helper_port: 12347,
            auto_launch: true,
            helper_script: "scripts/facemesh_helper.py".to_string(),
            max_faces: 1,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.7,
            refine_landmarks: true,
            detection_interval_ms: 33,
            response_timeout_ms: 500,
        }
    }
}

/// What happens to smoothing state when the face is lost and reacquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicy {
    /// Keep the last smoothed pose; a reappearing face eases in from it
    Persist,
    /// Drop smoothing state; the first frame after a gap snaps to the target
    Reset,
}

impl Default for GapPolicy {
    fn default() -> Self {
        Self::Persist
    }
}

/// Smoothing algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingMode {
    /// Exponential smoothing (linear interpolation toward the target)
    Exponential,
    /// Raw targets, no smoothing
    None,
}

impl Default for SmoothingMode {
    fn default() -> Self {
        Self::Exponential
    }
}

/// Landmark-to-pose mapping parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Smoothing algorithm
    pub smoothing: SmoothingMode,
    /// Interpolation factor per frame, in (0, 1]
    pub smoothing_factor: f32,
    /// Smoothing behavior across detection gaps
    pub gap_policy: GapPolicy,
    /// Overlay scale per unit of normalized inter-eye distance
    pub scale_factor: f32,
    /// Scene width spanned by the normalized image X range
    pub x_range: f32,
    /// Scene height spanned by the normalized image Y range
    pub y_range: f32,
    /// Scene position of the image center
    pub origin: [f32; 3],
    /// Inter-eye distance that maps to depth 0
    pub depth_reference: f32,
    /// Depth change per unit of inter-eye distance
    pub depth_gain: f32,
    /// Gain applied to yaw from ear depth asymmetry
    pub yaw_gain: f32,
    /// Gain applied to pitch from the forehead-to-nose vector
    pub pitch_gain: f32,
    /// Gain applied to roll from the eye line
    pub roll_gain: f32,
    /// Rest rotation of the asset (pitch, yaw, roll) in radians
    pub base_rotation: [f32; 3],
    /// Vertical offset per unit of nose-bridge drop below the eye center
    pub nose_bridge_y_gain: f32,
    /// Depth offset per unit of horizontal nose-bridge shift
    pub nose_bridge_z_gain: f32,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            smoothing: SmoothingMode::Exponential,
            smoothing_factor: 0.3,
            gap_policy: GapPolicy::Persist,
            scale_factor: 2.5,
            x_range: 2.5,
            y_range: 2.2,
            origin: [0.0, 0.15, 0.0],
            depth_reference: 0.1,
            depth_gain: 2.0,
            yaw_gain: 0.5,
            pitch_gain: 0.3,
            roll_gain: 0.8,
            base_rotation: [std::f32::consts::FRAC_PI_2, 0.0, 0.0],
            nose_bridge_y_gain: 0.5,
            nose_bridge_z_gain: 0.3,
        }
    }
}

/// Render loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Render loop rate
    pub fps_limit: u32,
    /// Apply the idle micro-animation to a visible overlay
    pub idle_animation: bool,
    /// Vertical bob amplitude in scene units
    pub bob_amplitude: f32,
    /// Yaw drift per frame in radians
    pub spin_rate: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fps_limit: 60,
            idle_animation: true,
            bob_amplitude: 0.001,
            spin_rate: 0.0005,
        }
    }
}

/// Model loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Base directory for relative model URLs
    pub models_dir: PathBuf,
    /// CORS proxy prefixes tried, in order, after a direct fetch of a remote URL fails
    pub cors_proxies: Vec<String>,
    /// Upper bound on fetch attempts per variant
    pub max_attempts: usize,
    /// Per-request timeout; unset means the fetch only fails when the transport does
    pub request_timeout_secs: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("."),
            cors_proxies: vec![
                "https://corsproxy.io/?".to_string(),
                "https://api.allorigins.win/raw?url=".to_string(),
            ],
            max_attempts: 4,
            request_timeout_secs: None,
        }
    }
}

/// A selectable glasses variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    /// Primary model URL (absolute http(s) or relative to loader.models_dir)
    pub url: String,
    /// Extra URLs tried before any proxy
    #[serde(default)]
    pub mirrors: Vec<String>,
    /// Size the model is normalized to, in scene units
    #[serde(default = "default_variant_scale")]
    pub scale: f32,
    /// Frame color for the placeholder model
    #[serde(default = "default_variant_color")]
    pub color: String,
}

fn default_variant_scale() -> f32 { 1.0 }
fn default_variant_color() -> String { "#2C3E50".to_string() }

/// Variant catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub default_variant: String,
    pub variants: Vec<VariantConfig>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let variant = |id: &str, name: &str, icon: &str, scale: f32, color: &str| VariantConfig {
            id: id.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            url: format!("models/sunglasses-{}.glb", id),
            mirrors: Vec::new(),
            scale,
            color: color.to_string(),
        };

        Self {
            default_variant: "aviator".to_string(),
            variants: vec![
                variant("aviator", "Aviator", "🕶️", 0.8, "#FFD700"),
                variant("wayfarer", "Wayfarer", "😎", 1.0, "#2C3E50"),
                variant("sport", "Sport", "🏃", 0.9, "#E74C3C"),
                variant("retro", "Retro", "✨", 0.85, "#9B59B6"),
            ],
        }
    }
}

/// Screenshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Stamp a text watermark in the bottom-right corner
    pub watermark: bool,
    pub watermark_text: String,
    /// TrueType font for the watermark; common system fonts are searched when unset
    pub font_path: Option<PathBuf>,
    /// Font size in pixels
    pub font_size: f32,
    /// Distance of the text baseline and right edge from the image corner
    pub margin: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            watermark: true,
            watermark_text: "Virtual Try-On".to_string(),
            font_path: None,
            font_size: 16.0,
            margin: 20,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Enable HTTP server
    pub enabled: bool,
    /// HTTP server host
    pub host: String,
    /// HTTP server port
    pub port: u16,
    /// Directory served as static files
    pub root: PathBuf,
    /// Add permissive CORS headers
    pub cors_enabled: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 3000,
            root: PathBuf::from("."),
            cors_enabled: true,
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("tryon3d");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/tryon3d");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/tryon3d");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("tryon3d");
        }
    }

    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http.port, 3000);
        assert_eq!(config.detector.max_faces, 1);
        assert_eq!(config.catalog.variants.len(), 4);
        assert_eq!(config.pose.gap_policy, GapPolicy::Persist);
        assert!(config.camera.mirrored);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.detector.auto_launch = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_smoothing_factor() {
        let mut config = Config::default();
        config.detector.auto_launch = false;
        config.pose.smoothing_factor = 0.0;
        assert!(config.validate().is_err());

        config.pose.smoothing_factor = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_default_variant() {
        let mut config = Config::default();
        config.detector.auto_launch = false;
        config.catalog.default_variant = "monocle".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_capture_section() {
        let config = Config::from_str(
            r#"
            [capture]
            watermark_text = "Shop"
            font_path = "/opt/fonts/Brand.ttf"
            margin = 8
        "#,
        )
        .unwrap();
        assert!(config.capture.watermark);
        assert_eq!(config.capture.watermark_text, "Shop");
        assert_eq!(config.capture.font_path, Some(PathBuf::from("/opt/fonts/Brand.ttf")));
        assert_eq!(config.capture.font_size, 16.0);
        assert_eq!(config.capture.margin, 8);

        let mut bad = Config::default();
        bad.detector.auto_launch = false;
        bad.capture.font_size = 0.0;
        assert!(bad.validate().is_err());
        bad.capture.watermark = false;
        assert!(bad.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [pose]
            smoothing_factor = 0.5
            gap_policy = "reset"

            [camera]
            facing = "environment"

            [http]
            port = 8000

            [[catalog.variants]]
            id = "round"
            name = "Round"
            url = "https://example.com/round.glb"

            [catalog]
            default_variant = "round"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.pose.smoothing_factor, 0.5);
        assert_eq!(config.pose.gap_policy, GapPolicy::Reset);
        assert_eq!(config.camera.facing, Facing::Environment);
        assert_eq!(config.http.port, 8000);
        assert_eq!(config.catalog.variants.len(), 1);
        assert_eq!(config.catalog.variants[0].scale, 1.0);
    }
}
