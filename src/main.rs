//! Tryon3D - Virtual Sunglasses Try-On Service
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tryon3d::{
    camera::CameraSource,
    config::Config,
    render::{RenderLoop, TracingRenderer},
    tracking::{
        subprocess::{check_mediapipe_available, DetectorProcess},
        DetectionGate, DetectionResult, MpReceiver,
    },
    web::WebServer,
    AppState, CameraCommand, Tryon3dError,
};

/// Tryon3D - Virtual sunglasses try-on service
#[derive(Parser, Debug)]
#[command(name = "tryon3d", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable HTTP server
    #[arg(long)]
    no_http: bool,

    /// HTTP server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory served as static files (overrides config)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Disable the face landmark detector
    #[arg(long)]
    no_detector: bool,

    /// Start the camera immediately
    #[arg(long)]
    start_camera: bool,

    /// Variant to load at startup (overrides config)
    #[arg(long)]
    variant: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", tryon3d::NAME, tryon3d::VERSION);

    let runtime = tokio::runtime::Runtime::new()?;

    let state = runtime.block_on(async { setup_and_spawn_services(&args).await })?;

    // Wait for Ctrl+C / SIGTERM
    runtime.block_on(async {
        shutdown_signal().await;
        info!("Shutdown signal received");
        state.shutdown();

        // Give tasks a moment to clean up
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    info!("Tryon3D stopped");
    Ok(())
}

/// Setup config, create AppState, and spawn all background services.
async fn setup_and_spawn_services(args: &Args) -> anyhow::Result<Arc<AppState>> {
    // Load configuration
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if args.no_http {
        config.http.enabled = false;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }
    if let Some(ref root) = args.root {
        config.http.root = root.clone();
    }
    if args.no_detector {
        config.detector.enabled = false;
    }
    if args.start_camera {
        config.camera.auto_start = true;
    }
    if let Some(ref variant) = args.variant {
        config.catalog.default_variant = variant.clone();
    }

    // Validate configuration
    config.validate()?;

    info!("HTTP server: {}", config.http.enabled);
    info!("Detector: {}", config.detector.enabled);
    info!(
        "Camera: {}x{} @ {} fps ({}), mirrored: {}",
        config.camera.width,
        config.camera.height,
        config.camera.ideal_fps,
        config.camera.facing.as_str(),
        config.camera.mirrored
    );

    if config.detector.enabled && config.detector.auto_launch && !check_mediapipe_available() {
        warn!("python3 cannot import mediapipe; the detector helper will fail to start");
    }

    // Create shared application state
    let state = AppState::new(config.clone())?;

    // Start HTTP server if enabled
    if config.http.enabled {
        let http_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = run_http_server(http_state).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    // Render loop runs regardless of detection state
    let render = RenderLoop::new(TracingRenderer, &config.render);
    tokio::spawn(render.run(
        Arc::clone(&state.overlay),
        Arc::clone(&state.model),
        state.subscribe_shutdown(),
    ));

    if config.detector.enabled {
        // Subscribe before anything can send a command
        let commands = state.subscribe_camera_commands();
        let camera_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = run_camera(camera_state, commands).await {
                error!("Camera task error: {}", e);
            }
        });

        let detection_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = run_detection(detection_state).await {
                error!("Detection error: {}", e);
            }
        });
    } else {
        info!("Detector disabled, camera controls are inactive");
    }

    // Initial variant
    if let Some(variant) = state.catalog.default_variant() {
        let variant_state = Arc::clone(&state);
        let variant_id = variant.id.clone();
        tokio::spawn(async move {
            if let Err(e) = variant_state.select_variant(&variant_id).await {
                error!("Failed to load initial variant '{}': {}", variant_id, e);
            }
        });
    } else {
        warn!("Catalog is empty, no initial variant");
    }

    Ok(state)
}

async fn run_http_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let http_config = state.config.read().await.http.clone();

    let web_server = WebServer::new(state.clone(), &http_config);

    let addr = format!("{}:{}", http_config.host, http_config.port);
    info!(
        "HTTP server listening on {} (serving {})",
        addr,
        http_config.root.display()
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let mut shutdown_rx = state.subscribe_shutdown();

    axum::serve(listener, web_server.router())
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Owns the detector helper process (and with it the camera device)
async fn run_camera(
    state: Arc<AppState>,
    mut commands: tokio::sync::broadcast::Receiver<CameraCommand>,
) -> anyhow::Result<()> {
    let config = state.config.read().await.clone();
    let mut process = DetectorProcess::new(
        &config.detector,
        Duration::from_millis(config.camera.startup_grace_ms),
    );
    let mut shutdown_rx = state.subscribe_shutdown();
    let mut health = tokio::time::interval(Duration::from_secs(1));

    if config.camera.auto_start {
        if let Err(e) = state.start_camera(&mut process).await {
            warn!("Camera auto-start failed: {}", e);
        }
    }

    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Ok(CameraCommand::Start) => {
                        if state.active.is_active() {
                            debug!("Camera already running");
                        } else if let Err(e) = state.start_camera(&mut process).await {
                            warn!("Camera start failed: {}", e);
                        }
                    }
                    Ok(CameraCommand::Stop) => state.stop_camera(&mut process).await,
                    Ok(CameraCommand::Restart) => {
                        state.stop_camera(&mut process).await;
                        if let Err(e) = state.start_camera(&mut process).await {
                            warn!("Camera restart failed: {}", e);
                        }
                    }
                    Err(RecvError::Lagged(n)) => warn!("Dropped {} camera commands", n),
                    Err(RecvError::Closed) => break,
                }
            }
            _ = health.tick() => {
                state.check_camera(&mut process).await;
            }
            _ = shutdown_rx.recv() => {
                info!("Camera task shutting down");
                break;
            }
        }
    }

    process.close().await;
    Ok(())
}

/// Request one detection and wait for it. `None` if the detector did not answer in time.
async fn detect_once(
    receiver: &mut MpReceiver,
    timeout: Duration,
) -> Result<Option<DetectionResult>, Tryon3dError> {
    let frame_id = receiver.request().await?;
    match tokio::time::timeout(timeout, receiver.recv(frame_id)).await {
        Ok(result) => result.map(Some),
        Err(_) => Ok(None),
    }
}

async fn run_detection(state: Arc<AppState>) -> anyhow::Result<()> {
    let config = state.config.read().await.detector.clone();
    let timeout = Duration::from_millis(config.response_timeout_ms);

    let mut receiver = MpReceiver::new(&config);
    receiver.start().await?;

    let mut gate = DetectionGate::new(Duration::from_millis(config.detection_interval_ms));
    let mut ticker = tokio::time::interval(gate.interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut shutdown_rx = state.subscribe_shutdown();

    info!(
        "Detection started (port: {}, interval: {}ms)",
        config.port, config.detection_interval_ms
    );

    loop {
        tokio::select! {
            scheduled = ticker.tick() => {
                // Pace on the scheduled tick time; wakeups can run late
                if !state.active.is_active() || !gate.try_begin(scheduled.into_std()) {
                    continue;
                }

                let result = detect_once(&mut receiver, timeout).await;
                gate.complete();

                match result {
                    Ok(Some(detection)) => {
                        state.handle_detection(detection).await;
                    }
                    Ok(None) => debug!("Detector busy, frame dropped"),
                    Err(e) => {
                        warn!("Detection error: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Detection shutting down");
                break;
            }
        }
    }

    receiver.stop();
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
