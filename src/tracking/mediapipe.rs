//! MediaPipe FaceMesh receiver
//!
//! Talks JSON-over-UDP to the detector helper. For every frame we want
//! analysed a small request datagram goes to the helper; the helper grabs
//! the current camera frame, runs FaceMesh and replies with a result packet:
//!
//! ```json
//! {"frame_id": 7, "multi_face_landmarks": [[[0.41, 0.52, -0.01], ...]]}
//! ```
//!
//! An empty (or absent) `multi_face_landmarks` means no face this frame.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

use crate::config::DetectorConfig;
use crate::error::{TrackingError, Tryon3dError};
use crate::tracking::landmarks::LandmarkSet;

/// A single JSON result packet from the detector helper
#[derive(Debug, Clone, Deserialize)]
pub struct MpPacket {
    /// Echo of the request's frame id (0 for unsolicited packets)
    #[serde(default)]
    pub frame_id: u64,
    /// One landmark list per detected face
    #[serde(default)]
    pub multi_face_landmarks: Vec<Vec<[f32; 3]>>,
}

/// Options forwarded to the detector helper
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorOptions {
    pub max_num_faces: u32,
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl From<&DetectorConfig> for DetectorOptions {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            max_num_faces: config.max_faces,
            refine_landmarks: config.refine_landmarks,
            min_detection_confidence: config.min_detection_confidence,
            min_tracking_confidence: config.min_tracking_confidence,
        }
    }
}

/// Outcome of one detector call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    pub frame_id: u64,
    /// The tracked face, if any. Only the first face is used.
    pub face: Option<LandmarkSet>,
}

impl DetectionResult {
    pub fn no_face(frame_id: u64) -> Self {
        Self {
            frame_id,
            face: None,
        }
    }

    pub fn face_detected(&self) -> bool {
        self.face.is_some()
    }
}

impl From<MpPacket> for DetectionResult {
    fn from(packet: MpPacket) -> Self {
        let face = packet
            .multi_face_landmarks
            .into_iter()
            .next()
            .filter(|points| !points.is_empty())
            .map(LandmarkSet::from);

        Self {
            frame_id: packet.frame_id,
            face,
        }
    }
}

/// Parse a raw datagram into a detection result
pub fn parse_packet(bytes: &[u8]) -> Result<DetectionResult, TrackingError> {
    let packet: MpPacket = serde_json::from_slice(bytes)
        .map_err(|e| TrackingError::Parse(format!("JSON parse error: {}", e)))?;
    Ok(packet.into())
}

#[derive(Serialize)]
struct DetectRequest {
    frame_id: u64,
}

/// MediaPipe JSON-over-UDP receiver
pub struct MpReceiver {
    config: DetectorConfig,
    socket: Option<UdpSocket>,
    next_frame: u64,
}

impl MpReceiver {
    /// Create a new receiver (does not bind yet)
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            config: config.clone(),
            socket: None,
            next_frame: 1,
        }
    }

    /// Bind the UDP socket
    pub async fn start(&mut self) -> Result<(), Tryon3dError> {
        let addr = format!("{}:{}", self.config.listen_address, self.config.port);

        let socket = UdpSocket::bind(&addr).await.map_err(|e| {
            TrackingError::Receiver(format!("Failed to bind to {}: {}", addr, e))
        })?;

        tracing::info!("FaceMesh receiver listening on {}", addr);
        self.socket = Some(socket);

        Ok(())
    }

    /// Address the socket is actually bound to
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Address of the helper's request port
    pub fn helper_addr(&self) -> String {
        format!("{}:{}", self.config.listen_address, self.config.helper_port)
    }

    /// Ask the helper to analyse its current frame. Returns the frame id to wait for.
    pub async fn request(&mut self) -> Result<u64, Tryon3dError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| TrackingError::Receiver("Receiver not started".to_string()))?;

        let frame_id = self.next_frame;
        self.next_frame += 1;

        let payload = serde_json::to_vec(&DetectRequest { frame_id })
            .map_err(|e| TrackingError::Receiver(e.to_string()))?;

        socket
            .send_to(&payload, self.helper_addr())
            .await
            .map_err(|e| TrackingError::Receiver(format!("Send error: {}", e)))?;

        Ok(frame_id)
    }

    /// Wait for the result of `frame_id`. Stale replies from earlier requests are dropped.
    pub async fn recv(&self, frame_id: u64) -> Result<DetectionResult, Tryon3dError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| TrackingError::Receiver("Receiver not started".to_string()))?;

        let mut buf = vec![0u8; 65536];

        loop {
            let size = socket
                .recv(&mut buf)
                .await
                .map_err(|e| TrackingError::Receiver(format!("Receive error: {}", e)))?;

            let result = parse_packet(&buf[..size])?;
            if result.frame_id != 0 && result.frame_id < frame_id {
                tracing::trace!("Dropping stale detection for frame {}", result.frame_id);
                continue;
            }

            return Ok(result);
        }
    }

    /// Stop the receiver
    pub fn stop(&mut self) {
        self.socket = None;
        tracing::info!("FaceMesh receiver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_json(frame_id: u64, faces: usize) -> String {
        let face: Vec<[f32; 3]> = (0..478).map(|i| [i as f32 / 478.0, 0.5, 0.0]).collect();
        serde_json::json!({
            "frame_id": frame_id,
            "multi_face_landmarks": vec![face; faces],
        })
        .to_string()
    }

    #[test]
    fn test_parse_packet() {
        let result = parse_packet(face_json(3, 1).as_bytes()).unwrap();
        assert_eq!(result.frame_id, 3);
        assert!(result.face_detected());
        assert_eq!(result.face.unwrap().len(), 478);
    }

    #[test]
    fn test_parse_no_face() {
        let result = parse_packet(br#"{"frame_id": 4, "multi_face_landmarks": []}"#).unwrap();
        assert!(!result.face_detected());

        let result = parse_packet(br#"{}"#).unwrap();
        assert!(!result.face_detected());
        assert_eq!(result.frame_id, 0);
    }

    #[test]
    fn test_only_first_face_used() {
        let result = parse_packet(face_json(1, 3).as_bytes()).unwrap();
        assert!(result.face_detected());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_packet(b"not json"),
            Err(TrackingError::Parse(_))
        ));
    }

    #[test]
    fn test_detector_options() {
        let options = DetectorOptions::from(&DetectorConfig::default());
        assert_eq!(options.max_num_faces, 1);
        assert!(options.refine_landmarks);
        assert_eq!(options.min_detection_confidence, 0.7);
    }

    #[tokio::test]
    async fn test_request_and_receive_roundtrip() {
        let helper = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = DetectorConfig {
            port: 0,
            helper_port: helper.local_addr().unwrap().port(),
            ..Default::default()
        };

        let mut receiver = MpReceiver::new(&config);
        receiver.start().await.unwrap();
        let receiver_addr = receiver.local_addr().unwrap();

        let first = receiver.request().await.unwrap();
        let second = receiver.request().await.unwrap();
        assert_eq!(second, first + 1);

        let mut buf = [0u8; 128];
        let (n, _) = helper.recv_from(&mut buf).await.unwrap();
        let req: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(req["frame_id"], first);

        // A late reply for the first request must be skipped
        helper
            .send_to(face_json(first, 1).as_bytes(), receiver_addr)
            .await
            .unwrap();
        helper
            .send_to(
                format!(r#"{{"frame_id": {}, "multi_face_landmarks": []}}"#, second).as_bytes(),
                receiver_addr,
            )
            .await
            .unwrap();

        let result = receiver.recv(second).await.unwrap();
        assert_eq!(result.frame_id, second);
        assert!(!result.face_detected());
    }
}
