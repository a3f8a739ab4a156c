//! Tryon3D - Virtual Sunglasses Try-On Service
//!
//! Turns face landmarks from a MediaPipe FaceMesh helper into a 3D pose for
//! a glasses overlay:
//! - Landmark-to-pose mapping with exponential smoothing
//! - Model loading with a CORS-proxy fallback chain and placeholder geometry
//! - Fixed-rate render loop with idle animation
//! - Static file server, JSON API and SSE stream for the browser front-end

pub mod camera;
pub mod capture;
pub mod config;
pub mod error;
pub mod overlay;
pub mod pipeline;
pub mod pose;
pub mod render;
pub mod session;
pub mod tracking;
pub mod web;

pub use config::Config;
pub use error::{Result, Tryon3dError};

use image::RgbaImage;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{broadcast, Mutex, RwLock};

use camera::{CameraConstraints, CameraSource, CameraStart};
use capture::{Screenshot, Watermark};
use error::{CameraError, CaptureError, LoaderError};
use overlay::{
    LoadOutcome, LoadStates, ModelAsset, ModelFetcher, ModelLoader, OverlayState, VariantCatalog,
};
use pipeline::{ActiveFlag, FramePipeline};
use session::{Notice, Session, SessionEvent};
use tracking::DetectionResult;

/// Requests for the task that owns the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraCommand {
    Start,
    Stop,
    /// Stop and start again, picking up a new facing mode
    Restart,
}

/// Application state shared across all components
pub struct AppState {
    /// Current configuration
    pub config: RwLock<Config>,
    /// User-visible session state
    pub session: RwLock<Session>,
    /// Current overlay transform
    pub overlay: Arc<RwLock<OverlayState>>,
    /// Model of the selected variant
    pub model: Arc<RwLock<Option<Arc<ModelAsset>>>>,
    /// Channel for overlay updates
    pub overlay_tx: broadcast::Sender<OverlayState>,
    /// Channel for user notices
    pub notice_tx: broadcast::Sender<Notice>,
    /// Channel for camera commands
    pub camera_tx: broadcast::Sender<CameraCommand>,
    /// Shutdown signal
    pub shutdown_tx: broadcast::Sender<()>,
    /// Set while the camera runs; every pipeline stage checks it
    pub active: ActiveFlag,
    pub pipeline: Mutex<FramePipeline>,
    pub catalog: VariantCatalog,
    /// Held for a whole fetch chain; read `load_states` instead for status
    pub loader: Mutex<ModelLoader<ModelFetcher>>,
    pub load_states: LoadStates,
    pub watermark: Option<Watermark>,
}

impl AppState {
    /// Create a new application state with the given configuration
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let (overlay_tx, _) = broadcast::channel(64);
        let (notice_tx, _) = broadcast::channel(64);
        let (camera_tx, _) = broadcast::channel(8);
        let (shutdown_tx, _) = broadcast::channel(1);

        let active = ActiveFlag::new(false);
        let fetcher = ModelFetcher::new(&config.loader)?;
        let loader = ModelLoader::new(fetcher, &config.loader);
        let watermark = Watermark::from_config(&config.capture)?;

        Ok(Arc::new(Self {
            session: RwLock::new(Session::new(&config.camera)),
            overlay: Arc::new(RwLock::new(OverlayState::default())),
            model: Arc::new(RwLock::new(None)),
            overlay_tx,
            notice_tx,
            camera_tx,
            shutdown_tx,
            pipeline: Mutex::new(FramePipeline::new(&config.pose, active.clone())),
            active,
            catalog: VariantCatalog::new(&config.catalog),
            load_states: loader.load_states(),
            loader: Mutex::new(loader),
            watermark,
            config: RwLock::new(config),
        }))
    }

    /// Update the overlay state and broadcast the change
    pub async fn update_overlay(&self, state: OverlayState) {
        let mut current = self.overlay.write().await;
        *current = state.clone();
        let _ = self.overlay_tx.send(state);
    }

    /// Read-modify-write the overlay under one write lock.
    ///
    /// `f` returning `None` leaves the overlay untouched and broadcasts nothing.
    pub async fn modify_overlay<F>(&self, f: F) -> Option<OverlayState>
    where
        F: FnOnce(&OverlayState) -> Option<OverlayState>,
    {
        let mut current = self.overlay.write().await;
        let next = f(&current)?;
        *current = next.clone();
        let _ = self.overlay_tx.send(next.clone());
        Some(next)
    }

    /// Get the current overlay state
    pub async fn get_overlay(&self) -> OverlayState {
        self.overlay.read().await.clone()
    }

    /// Get the current session
    pub async fn get_session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Subscribe to overlay changes
    pub fn subscribe_overlay(&self) -> broadcast::Receiver<OverlayState> {
        self.overlay_tx.subscribe()
    }

    /// Subscribe to user notices
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    /// Subscribe to camera commands
    pub fn subscribe_camera_commands(&self) -> broadcast::Receiver<CameraCommand> {
        self.camera_tx.subscribe()
    }

    /// Ask the camera task to do something
    pub fn send_camera_command(&self, command: CameraCommand) {
        if self.camera_tx.send(command).is_err() {
            tracing::warn!("No camera task listening for {:?}", command);
        }
    }

    /// Subscribe to shutdown signal
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Apply a session event, publish its notices and sync the active flag
    pub async fn apply_event(&self, event: SessionEvent) -> Vec<Notice> {
        let notices = {
            let mut session = self.session.write().await;
            let (next, notices) = session.clone().apply(&event);
            self.active.set(next.camera_active);
            *session = next;
            notices
        };

        for notice in &notices {
            match notice {
                Notice::Error(m) => tracing::warn!("{}", m),
                Notice::Status(m) | Notice::Toast(m) => tracing::info!("{}", m),
            }
            let _ = self.notice_tx.send(notice.clone());
        }

        notices
    }

    async fn hide_overlay(&self) {
        self.modify_overlay(|overlay| {
            (overlay.is_visible() || overlay.face_detected()).then(|| overlay.clone().hidden())
        })
        .await;
    }

    /// Open the camera with the configured constraints and the session's facing mode
    pub async fn start_camera<S: CameraSource>(
        &self,
        source: &mut S,
    ) -> std::result::Result<CameraStart, CameraError> {
        self.apply_event(SessionEvent::CameraStarting).await;

        let facing = self.session.read().await.facing;
        let constraints = CameraConstraints::from_config(&self.config.read().await.camera).with_facing(facing);

        match camera::start_camera(source, constraints).await {
            Ok(start) => {
                self.pipeline.lock().await.reset();
                self.apply_event(SessionEvent::CameraStarted {
                    fallback: start.fallback,
                })
                .await;
                Ok(start)
            }
            Err(e) => {
                self.apply_event(SessionEvent::CameraFailed(e.clone())).await;
                self.hide_overlay().await;
                Err(e)
            }
        }
    }

    /// Close the camera and hide the overlay
    pub async fn stop_camera<S: CameraSource>(&self, source: &mut S) {
        self.active.set(false);
        source.close().await;
        self.apply_event(SessionEvent::CameraStopped).await;
        self.hide_overlay().await;
    }

    /// Camera source died on its own; same cleanup as a stop, reported as a failure
    pub async fn camera_lost<S: CameraSource>(&self, source: &mut S) {
        self.active.set(false);
        source.close().await;
        self.apply_event(SessionEvent::CameraFailed(CameraError::Other(
            "camera stream ended".to_string(),
        )))
        .await;
        self.hide_overlay().await;
    }

    /// Health check for a running camera. Returns false if it was found dead.
    pub async fn check_camera<S: CameraSource>(&self, source: &mut S) -> bool {
        if !self.active.is_active() || source.is_open() {
            return true;
        }
        tracing::warn!("Camera source closed unexpectedly");
        self.camera_lost(source).await;
        false
    }

    /// Run one detector result through the pipeline. `None` if the camera is inactive.
    ///
    /// The overlay write lock is held across mapping and store, so a concurrent
    /// stop either sees the new state and hides it, or the pipeline sees the
    /// cleared flag and writes nothing.
    pub async fn handle_detection(&self, detection: DetectionResult) -> Option<OverlayState> {
        let mirrored = self.session.read().await.mirrored;

        let next = {
            let mut current = self.overlay.write().await;
            let next = self.pipeline.lock().await.process(&detection, &current, mirrored)?;
            *current = next.clone();
            let _ = self.overlay_tx.send(next.clone());
            next
        };

        let event = if next.face_detected() {
            SessionEvent::FaceDetected
        } else {
            SessionEvent::FaceLost
        };
        self.apply_event(event).await;

        Some(next)
    }

    /// Switch to a variant, loading (or reusing) its model
    pub async fn select_variant(&self, id: &str) -> std::result::Result<LoadOutcome, LoaderError> {
        let variant = self
            .catalog
            .get(id)
            .cloned()
            .ok_or_else(|| LoaderError::UnknownVariant(id.to_string()))?;

        self.apply_event(SessionEvent::VariantLoading {
            id: variant.id.clone(),
            name: variant.name.clone(),
        })
        .await;

        let outcome = self.loader.lock().await.load(&variant).await?;
        *self.model.write().await = Some(outcome.asset.clone());

        let placeholder = outcome.is_fallback();
        self.modify_overlay(|overlay| Some(overlay.clone().with_variant(&variant.id, placeholder)))
            .await;

        self.apply_event(SessionEvent::VariantLoaded {
            id: variant.id.clone(),
            name: variant.name.clone(),
            fallback: outcome.is_fallback(),
        })
        .await;

        Ok(outcome)
    }

    /// Composite a screenshot from a video frame and the rendered overlay layer
    pub async fn capture(
        &self,
        video: &RgbaImage,
        overlay: Option<&RgbaImage>,
    ) -> std::result::Result<Screenshot, CaptureError> {
        let session = self.get_session().await;

        match capture::capture(
            session.face_detected,
            video,
            overlay,
            session.mirrored,
            self.watermark.as_ref(),
            SystemTime::now(),
        ) {
            Ok(shot) => {
                self.apply_event(SessionEvent::CaptureSaved {
                    filename: shot.filename.clone(),
                })
                .await;
                Ok(shot)
            }
            Err(CaptureError::NoFace) => {
                self.apply_event(SessionEvent::CaptureRefused).await;
                Err(CaptureError::NoFace)
            }
            Err(e) => {
                tracing::error!("Screenshot failed: {}", e);
                self.apply_event(SessionEvent::CaptureFailed).await;
                Err(e)
            }
        }
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
