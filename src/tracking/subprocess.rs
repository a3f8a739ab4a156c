//! Detector helper subprocess
//!
//! Launches the Python FaceMesh helper as a child process with automatic
//! cleanup on drop. The helper owns the capture device, so starting it is
//! also how the camera gets opened; early exits are turned into
//! [`CameraError`]s from whatever the helper printed on stderr.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::camera::{CameraConstraints, CameraSource};
use crate::config::DetectorConfig;
use crate::error::CameraError;
use crate::tracking::mediapipe::DetectorOptions;

/// Manages the detector helper subprocess
pub struct DetectorProcess {
    child: Option<Child>,
    config: DetectorConfig,
    startup_grace: Duration,
}

impl DetectorProcess {
    /// Create a new subprocess manager (does not start the process)
    pub fn new(config: &DetectorConfig, startup_grace: Duration) -> Self {
        Self {
            child: None,
            config: config.clone(),
            startup_grace,
        }
    }

    /// Command-line arguments for the helper
    pub fn args(&self, constraints: &CameraConstraints) -> Vec<String> {
        let options = DetectorOptions::from(&self.config);
        let mut args = vec![
            self.config.helper_script.clone(),
            "--ip".to_string(),
            self.config.listen_address.clone(),
            "--port".to_string(),
            self.config.port.to_string(),
            "--request-port".to_string(),
            self.config.helper_port.to_string(),
            "--capture".to_string(),
            constraints.device.to_string(),
            "--facing".to_string(),
            constraints.facing.as_str().to_string(),
            "--max-faces".to_string(),
            options.max_num_faces.to_string(),
            "--min-detection-confidence".to_string(),
            options.min_detection_confidence.to_string(),
            "--min-tracking-confidence".to_string(),
            options.min_tracking_confidence.to_string(),
        ];

        if options.refine_landmarks {
            args.push("--refine-landmarks".to_string());
        }

        for (flag, value) in [
            ("--width", constraints.width),
            ("--height", constraints.height),
            ("--fps", constraints.ideal_fps),
            ("--max-fps", constraints.max_fps),
        ] {
            if let Some(v) = value {
                args.push(flag.to_string());
                args.push(v.to_string());
            }
        }

        args
    }

    /// Launch the helper and wait out the startup grace period.
    async fn launch(&mut self, constraints: &CameraConstraints) -> Result<(), CameraError> {
        let mut child = Command::new("python3")
            .args(self.args(constraints))
            .kill_on_drop(true)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| {
                CameraError::Other(format!(
                    "Failed to launch detector helper at '{}': {}",
                    self.config.helper_script, e
                ))
            })?;

        tracing::info!(
            "Detector helper started (pid: {:?}, camera: {}, port: {})",
            child.id(),
            constraints.device,
            self.config.port,
        );

        match tokio::time::timeout(self.startup_grace, child.wait()).await {
            Err(_) => {
                // Still running after the grace period; keep stderr drained
                if let Some(pipe) = child.stderr.take() {
                    tokio::spawn(async move {
                        let mut lines = BufReader::new(pipe).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            tracing::debug!("detector helper: {}", line);
                        }
                    });
                }
                self.child = Some(child);
                Ok(())
            }
            Ok(Ok(status)) => {
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                tracing::warn!("Detector helper exited with {}: {}", status, stderr.trim());

                let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty());
                Err(CameraError::classify(last_line.unwrap_or("helper exited during startup")))
            }
            Ok(Err(e)) => Err(CameraError::Other(format!(
                "Failed to wait on detector helper: {}",
                e
            ))),
        }
    }

    /// Stop the subprocess by killing it
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::info!("Stopping detector helper (pid: {:?})", child.id());
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }

    /// Check if the subprocess is still running (non-blocking)
    pub fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    tracing::warn!("Detector helper exited with: {}", status);
                    self.child = None;
                    false
                }
                Err(e) => {
                    tracing::error!("Failed to check detector helper status: {}", e);
                    false
                }
            },
            None => false,
        }
    }
}

impl CameraSource for DetectorProcess {
    async fn open(&mut self, constraints: &CameraConstraints) -> Result<(), CameraError> {
        self.stop().await;

        if !self.config.auto_launch {
            tracing::info!(
                "Detector auto_launch disabled, expecting an external helper on port {}",
                self.config.helper_port
            );
            return Ok(());
        }

        self.launch(constraints).await
    }

    async fn close(&mut self) {
        self.stop().await;
    }

    fn is_open(&mut self) -> bool {
        !self.config.auto_launch || self.is_running()
    }
}

/// Check if the `mediapipe` Python package is available.
///
/// Runs `python3 -c "import mediapipe"` and returns true if it succeeds.
pub fn check_mediapipe_available() -> bool {
    match std::process::Command::new("python3")
        .args(["-c", "import mediapipe"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
    {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CameraConfig, Facing};

    #[test]
    fn test_args_full_constraints() {
        let process = DetectorProcess::new(&DetectorConfig::default(), Duration::from_millis(10));
        let args = process.args(&CameraConstraints::from_config(&CameraConfig::default()));

        assert_eq!(args[0], "scripts/facemesh_helper.py");
        assert!(args.contains(&"--refine-landmarks".to_string()));
        let width = args.iter().position(|a| a == "--width").unwrap();
        assert_eq!(args[width + 1], "1280");
        let fps = args.iter().position(|a| a == "--max-fps").unwrap();
        assert_eq!(args[fps + 1], "60");
    }

    #[test]
    fn test_args_minimal_constraints() {
        let process = DetectorProcess::new(&DetectorConfig::default(), Duration::from_millis(10));
        let args = process.args(&CameraConstraints::minimal(0, Facing::Environment));

        assert!(!args.contains(&"--width".to_string()));
        assert!(!args.contains(&"--fps".to_string()));
        let facing = args.iter().position(|a| a == "--facing").unwrap();
        assert_eq!(args[facing + 1], "environment");
    }

    #[tokio::test]
    async fn test_external_helper_needs_no_launch() {
        let config = DetectorConfig {
            auto_launch: false,
            ..Default::default()
        };
        let mut process = DetectorProcess::new(&config, Duration::from_millis(10));
        let constraints = CameraConstraints::from_config(&CameraConfig::default());
        assert!(process.open(&constraints).await.is_ok());
        assert!(process.is_open());
        process.close().await;
    }

    #[tokio::test]
    async fn test_helper_permission_failure_is_classified() {
        if !std::process::Command::new("python3")
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
        {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("helper.py");
        std::fs::write(
            &script,
            "import sys\nprint('Permission denied: /dev/video0', file=sys.stderr)\nsys.exit(1)\n",
        )
        .unwrap();

        let config = DetectorConfig {
            helper_script: script.display().to_string(),
            ..Default::default()
        };
        let mut process = DetectorProcess::new(&config, Duration::from_secs(5));
        let constraints = CameraConstraints::from_config(&CameraConfig::default());

        assert_eq!(
            process.open(&constraints).await,
            Err(CameraError::PermissionDenied)
        );
        assert!(!process.is_open());
    }
}
