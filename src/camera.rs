//! Camera acquisition lifecycle.
//!
//! A [`CameraSession`] owns at most one live stream. The previous stream is
//! always fully stopped before another one is requested, and dropping the
//! session releases whatever it still holds.

use tracing::{debug, info, warn};

use crate::error::{CameraError, CameraResult};

/// Shown to the user whenever the camera cannot be acquired.
pub const CAMERA_UNAVAILABLE_MESSAGE: &str = "Unable to access camera";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    VideoInput,
    /// Enumerated but unable to deliver video frames, such as metadata nodes.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoConstraint {
    Any,
    ExactDevice(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub video: VideoConstraint,
    pub audio: bool,
}

impl StreamConstraints {
    pub fn video_only() -> Self {
        Self {
            video: VideoConstraint::Any,
            audio: false,
        }
    }

    pub fn exact_device(device_id: impl Into<String>) -> Self {
        Self {
            video: VideoConstraint::ExactDevice(device_id.into()),
            audio: false,
        }
    }
}

/// A live stream of one or more tracks.
pub trait MediaStream {
    /// Device backing the first video track.
    fn device_id(&self) -> Option<&str>;

    fn stop_tracks(&mut self);
}

/// Platform capability surface for video capture.
#[allow(async_fn_in_trait)]
pub trait MediaDevices {
    type Stream: MediaStream;

    async fn get_user_media(&self, constraints: &StreamConstraints) -> CameraResult<Self::Stream>;

    async fn enumerate_devices(&self) -> CameraResult<Vec<DeviceInfo>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraState {
    Idle,
    Active,
    Error { message: String },
}

pub struct CameraSession<D: MediaDevices> {
    devices: D,
    state: CameraState,
    stream: Option<D::Stream>,
}

impl<D: MediaDevices> CameraSession<D> {
    pub fn new(devices: D) -> Self {
        Self {
            devices,
            state: CameraState::Idle,
            stream: None,
        }
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == CameraState::Active
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            CameraState::Error { message } => Some(message),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn stream(&self) -> Option<&D::Stream> {
        self.stream.as_ref()
    }

    pub fn active_device_id(&self) -> Option<&str> {
        self.stream.as_ref().and_then(MediaStream::device_id)
    }

    /// Acquires a video-only stream. Failure leaves the session in `Error`; no
    /// retry happens until the caller starts again.
    pub async fn start(&mut self) -> CameraResult<()> {
        if self.is_active() {
            debug!("camera already active");
            return Ok(());
        }
        self.acquire(StreamConstraints::video_only()).await
    }

    /// Releases every track and detaches the stream. No-op without a stream.
    pub fn stop(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        let device = stream.device_id().map(str::to_string);
        stream.stop_tracks();
        self.state = CameraState::Idle;
        info!(device = device.as_deref().unwrap_or("unknown"), "camera stopped");
    }

    /// Moves to the first other video input. With fewer than two inputs the
    /// current stream is kept. If the replacement cannot be acquired the
    /// session ends up in `Error` with nothing held.
    pub async fn switch_device(&mut self) -> CameraResult<()> {
        if !self.is_active() {
            return Err(CameraError::NotActive);
        }

        let inputs: Vec<DeviceInfo> = self
            .devices
            .enumerate_devices()
            .await?
            .into_iter()
            .filter(|device| device.kind == DeviceKind::VideoInput)
            .collect();

        if inputs.len() < 2 {
            debug!(inputs = inputs.len(), "no alternative camera to switch to");
            return Ok(());
        }

        let current = self.active_device_id().map(str::to_string);
        let Some(next) = inputs
            .into_iter()
            .find(|device| Some(device.device_id.as_str()) != current.as_deref())
        else {
            return Ok(());
        };

        info!(from = current.as_deref().unwrap_or("unknown"), to = %next.device_id, "switching camera");
        self.stop();
        self.acquire(StreamConstraints::exact_device(next.device_id))
            .await
    }

    async fn acquire(&mut self, constraints: StreamConstraints) -> CameraResult<()> {
        match self.devices.get_user_media(&constraints).await {
            Ok(stream) => {
                info!(device = stream.device_id().unwrap_or("unknown"), "camera started");
                self.stream = Some(stream);
                self.state = CameraState::Active;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "camera acquisition failed");
                self.stream = None;
                self.state = CameraState::Error {
                    message: CAMERA_UNAVAILABLE_MESSAGE.to_string(),
                };
                Err(err)
            }
        }
    }
}

impl<D: MediaDevices> Drop for CameraSession<D> {
    fn drop(&mut self) {
        self.stop();
    }
}
