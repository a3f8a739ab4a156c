//! Render loop
//!
//! Ticks at a fixed rate whether or not a face is being tracked and hands
//! exactly one frame per tick to a [`Renderer`]. The actual drawing happens
//! in the browser client (or any other renderer plugged in here); this loop
//! owns frame pacing and the idle micro-animation of a visible overlay.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};

use crate::config::RenderConfig;
use crate::overlay::{ModelAsset, OverlayState};
use crate::pose::Pose;

/// Everything a renderer needs for one frame
#[derive(Debug, Clone)]
pub struct RenderFrame<'a> {
    pub index: u64,
    /// Seconds since the loop started
    pub time: f32,
    /// Animated overlay transform, `None` when the overlay is hidden
    pub overlay: Option<Pose>,
    pub model: Option<&'a ModelAsset>,
}

/// Draw target
pub trait Renderer: Send {
    fn draw(&mut self, frame: &RenderFrame<'_>);
}

/// Renderer that only logs; the default when nothing draws server-side
#[derive(Debug, Default)]
pub struct TracingRenderer;

impl Renderer for TracingRenderer {
    fn draw(&mut self, frame: &RenderFrame<'_>) {
        if let Some(pose) = frame.overlay {
            tracing::trace!(
                "frame {}: overlay at {:?} scale {:.3}",
                frame.index,
                pose.position,
                pose.scale
            );
        }
    }
}

/// Frames-per-second counter, updated once per second
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    frames: u32,
    window: Duration,
    fps: f32,
}

impl FrameStats {
    /// Count one frame. Returns the new FPS value when a one-second window closes.
    pub fn record(&mut self, dt: Duration) -> Option<f32> {
        self.frames += 1;
        self.window += dt;

        if self.window >= Duration::from_secs(1) {
            self.fps = self.frames as f32 / self.window.as_secs_f32();
            self.frames = 0;
            self.window = Duration::ZERO;
            Some(self.fps)
        } else {
            None
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

pub struct RenderLoop<R> {
    renderer: R,
    config: RenderConfig,
    time: f32,
    index: u64,
    /// Pose the idle drift is accumulated on
    anchor: Option<Pose>,
    bob: f32,
    spin: f32,
    stats: FrameStats,
}

impl<R: Renderer> RenderLoop<R> {
    pub fn new(renderer: R, config: &RenderConfig) -> Self {
        Self {
            renderer,
            config: config.clone(),
            time: 0.0,
            index: 0,
            anchor: None,
            bob: 0.0,
            spin: 0.0,
            stats: FrameStats::default(),
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Overlay transform for this tick including idle drift
    fn animate(&mut self, overlay: &OverlayState) -> Option<Pose> {
        if !overlay.is_visible() {
            self.anchor = None;
            return None;
        }

        let pose = overlay.pose();
        if self.anchor != Some(pose) {
            // New detection: drift restarts from the fresh pose
            self.anchor = Some(pose);
            self.bob = 0.0;
            self.spin = 0.0;
        }

        if self.config.idle_animation {
            self.bob += self.time.sin() * self.config.bob_amplitude;
            self.spin += self.config.spin_rate;
        }

        let mut animated = pose;
        animated.position.y += self.bob;
        animated.rotation.y += self.spin;
        Some(animated)
    }

    /// Advance by `dt` and draw exactly one frame
    pub fn tick(&mut self, dt: Duration, overlay: &OverlayState, model: Option<&ModelAsset>) -> Option<Pose> {
        self.time += dt.as_secs_f32();
        self.index += 1;

        let animated = self.animate(overlay);
        let frame = RenderFrame {
            index: self.index,
            time: self.time,
            overlay: animated,
            model,
        };
        self.renderer.draw(&frame);

        if let Some(fps) = self.stats.record(dt) {
            tracing::debug!("Render loop: {:.1} fps", fps);
        }

        animated
    }

    /// Tick at the configured rate until shutdown
    pub async fn run(
        mut self,
        overlay: Arc<RwLock<OverlayState>>,
        model: Arc<RwLock<Option<Arc<ModelAsset>>>>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let period = Duration::from_secs_f64(1.0 / self.config.fps_limit.max(1) as f64);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last = Instant::now();

        tracing::info!("Render loop started at {} fps", self.config.fps_limit);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Instant::now();
                    let dt = now - last;
                    last = now;

                    let state = overlay.read().await.clone();
                    let asset = model.read().await.clone();
                    self.tick(dt, &state, asset.as_deref());
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Render loop shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[derive(Default)]
    struct CountingRenderer {
        frames: Vec<Option<Pose>>,
    }

    impl Renderer for CountingRenderer {
        fn draw(&mut self, frame: &RenderFrame<'_>) {
            self.frames.push(frame.overlay);
        }
    }

    fn visible() -> OverlayState {
        OverlayState::default().with_pose(Pose {
            position: Vec3::new(0.0, 0.15, 0.2),
            scale: 0.5,
            rotation: Vec3::ZERO,
        })
    }

    #[test]
    fn test_one_draw_per_tick_even_when_hidden() {
        let mut render = RenderLoop::new(CountingRenderer::default(), &RenderConfig::default());
        let hidden = OverlayState::default();
        for _ in 0..5 {
            render.tick(Duration::from_millis(16), &hidden, None);
        }
        assert_eq!(render.renderer().frames.len(), 5);
        assert!(render.renderer().frames.iter().all(|f| f.is_none()));
    }

    #[test]
    fn test_idle_spin_accumulates() {
        let config = RenderConfig::default();
        let mut render = RenderLoop::new(CountingRenderer::default(), &config);
        let overlay = visible();

        render.tick(Duration::from_millis(16), &overlay, None);
        let pose = render.tick(Duration::from_millis(16), &overlay, None).unwrap();
        assert!((pose.rotation.y - 2.0 * config.spin_rate).abs() < 1e-7);
        assert!((pose.position.y - 0.15).abs() < 2.0 * config.bob_amplitude + 1e-6);
    }

    #[test]
    fn test_new_pose_restarts_drift() {
        let config = RenderConfig::default();
        let mut render = RenderLoop::new(CountingRenderer::default(), &config);
        render.tick(Duration::from_millis(16), &visible(), None);
        render.tick(Duration::from_millis(16), &visible(), None);

        let moved = OverlayState::default().with_pose(Pose::default());
        let pose = render.tick(Duration::from_millis(16), &moved, None).unwrap();
        assert!((pose.rotation.y - config.spin_rate).abs() < 1e-7);
    }

    #[test]
    fn test_no_animation_when_disabled() {
        let config = RenderConfig {
            idle_animation: false,
            ..Default::default()
        };
        let mut render = RenderLoop::new(CountingRenderer::default(), &config);
        let pose = render.tick(Duration::from_millis(16), &visible(), None).unwrap();
        assert_eq!(pose, visible().pose());
    }

    #[test]
    fn test_frame_stats() {
        let mut stats = FrameStats::default();
        let mut reported = None;
        for _ in 0..60 {
            if let Some(fps) = stats.record(Duration::from_micros(16_667)) {
                reported = Some(fps);
            }
        }
        let fps = reported.unwrap();
        assert!((fps - 60.0).abs() < 0.5);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (tx, rx) = broadcast::channel(1);
        let render = RenderLoop::new(TracingRenderer, &RenderConfig::default());
        let handle = tokio::spawn(render.run(
            Arc::new(RwLock::new(OverlayState::default())),
            Arc::new(RwLock::new(None)),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
