//! video4linux capture devices.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tracing::debug;

use crate::camera::{
    DeviceInfo, DeviceKind, MediaDevices, MediaStream, StreamConstraints, VideoConstraint,
};
use crate::error::{CameraError, CameraResult};

const EBUSY: i32 = 16;

#[derive(Debug, Clone)]
pub struct V4lDevices {
    dev_dir: PathBuf,
    sysfs_dir: PathBuf,
}

impl V4lDevices {
    pub fn new(dev_dir: impl Into<PathBuf>, sysfs_dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
            sysfs_dir: sysfs_dir.into(),
        }
    }

    async fn label_for(&self, node: &str) -> String {
        match fs::read_to_string(self.sysfs_dir.join(node).join("name")).await {
            Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => node.to_string(),
        }
    }

    /// UVC cameras expose a metadata node next to the capture node; only
    /// index 0 delivers frames. Nodes without an index file count as capture.
    async fn kind_for(&self, node: &str) -> DeviceKind {
        match fs::read_to_string(self.sysfs_dir.join(node).join("index")).await {
            Ok(index) if index.trim().parse::<u32>().is_ok_and(|index| index != 0) => {
                DeviceKind::Other
            }
            _ => DeviceKind::VideoInput,
        }
    }
}

/// An open capture node. Closing the handle releases the device.
#[derive(Debug)]
pub struct V4lStream {
    device_id: String,
    handle: Option<File>,
}

impl MediaStream for V4lStream {
    fn device_id(&self) -> Option<&str> {
        Some(&self.device_id)
    }

    fn stop_tracks(&mut self) {
        if self.handle.take().is_some() {
            debug!(device = %self.device_id, "closed capture node");
        }
    }
}

fn map_open_error(device_id: &str, err: io::Error) -> CameraError {
    if err.raw_os_error() == Some(EBUSY) {
        return CameraError::DeviceBusy(device_id.to_string());
    }
    match err.kind() {
        io::ErrorKind::NotFound => CameraError::DeviceNotFound(device_id.to_string()),
        io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(device_id.to_string()),
        _ => CameraError::Io(err),
    }
}

fn is_capture_node(name: &str) -> bool {
    name.strip_prefix("video")
        .is_some_and(|suffix| !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()))
}

impl MediaDevices for V4lDevices {
    type Stream = V4lStream;

    /// Acquisition means an open handle on the node, held until the stream is
    /// stopped. V4L2 allows several opens of one node, so exclusivity is only
    /// guaranteed among sessions of this process.
    async fn get_user_media(&self, constraints: &StreamConstraints) -> CameraResult<V4lStream> {
        let device_id = match &constraints.video {
            VideoConstraint::ExactDevice(id) => id.clone(),
            VideoConstraint::Any => self
                .enumerate_devices()
                .await?
                .into_iter()
                .find(|device| device.kind == DeviceKind::VideoInput)
                .map(|device| device.device_id)
                .ok_or(CameraError::NoDevice)?,
        };

        let handle = OpenOptions::new()
            .read(true)
            .write(true)
            .open(Path::new(&device_id))
            .await
            .map_err(|err| map_open_error(&device_id, err))?;

        Ok(V4lStream {
            device_id,
            handle: Some(handle),
        })
    }

    async fn enumerate_devices(&self) -> CameraResult<Vec<DeviceInfo>> {
        let mut entries = match fs::read_dir(&self.dev_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut nodes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_capture_node(&name) {
                nodes.push(name);
            }
        }
        nodes.sort_by_key(|name| name["video".len()..].parse::<u32>().unwrap_or(u32::MAX));

        let mut devices = Vec::with_capacity(nodes.len());
        for node in nodes {
            devices.push(DeviceInfo {
                device_id: self.dev_dir.join(&node).to_string_lossy().into_owned(),
                kind: self.kind_for(&node).await,
                label: self.label_for(&node).await,
            });
        }
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraSession;

    struct Fixture {
        _dev: tempfile::TempDir,
        sys: tempfile::TempDir,
        devices: V4lDevices,
    }

    impl Fixture {
        fn set_index(&self, node: &str, index: u32) {
            let dir = self.sys.path().join(node);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("index"), format!("{index}\n")).unwrap();
        }
    }

    fn fixture(nodes: &[(&str, Option<&str>)]) -> Fixture {
        let dev = tempfile::tempdir().unwrap();
        let sys = tempfile::tempdir().unwrap();
        std::fs::write(dev.path().join("null"), b"").unwrap();
        for (node, label) in nodes {
            std::fs::write(dev.path().join(node), b"").unwrap();
            if let Some(label) = label {
                std::fs::create_dir_all(sys.path().join(node)).unwrap();
                std::fs::write(sys.path().join(node).join("name"), format!("{label}\n")).unwrap();
            }
        }
        let devices = V4lDevices::new(dev.path(), sys.path());
        Fixture {
            _dev: dev,
            sys,
            devices,
        }
    }

    #[test]
    fn capture_node_names() {
        assert!(is_capture_node("video0"));
        assert!(is_capture_node("video12"));
        assert!(!is_capture_node("video"));
        assert!(!is_capture_node("videox"));
        assert!(!is_capture_node("null"));
    }

    #[tokio::test]
    async fn enumerates_nodes_in_numeric_order_with_labels() {
        let fx = fixture(&[("video10", None), ("video2", Some("USB Camera")), ("video0", Some("Integrated"))]);
        let devices = fx.devices.enumerate_devices().await.unwrap();
        let labels: Vec<&str> = devices.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["Integrated", "USB Camera", "video10"]);
        assert!(devices.iter().all(|d| d.kind == DeviceKind::VideoInput));
        assert!(devices[0].device_id.ends_with("video0"));
    }

    #[tokio::test]
    async fn missing_dev_dir_means_no_devices() {
        let devices = V4lDevices::new("/nonexistent/classcorer/dev", "/nonexistent/classcorer/sys");
        assert!(devices.enumerate_devices().await.unwrap().is_empty());
        assert!(matches!(
            devices.get_user_media(&StreamConstraints::video_only()).await,
            Err(CameraError::NoDevice)
        ));
    }

    #[tokio::test]
    async fn exact_device_that_vanished_is_not_found() {
        let fx = fixture(&[("video0", None)]);
        let missing = fx.devices.dev_dir.join("video7").to_string_lossy().into_owned();
        let err = fx
            .devices
            .get_user_media(&StreamConstraints::exact_device(missing))
            .await
            .unwrap_err();
        assert!(matches!(err, CameraError::DeviceNotFound(_)));
    }

    #[tokio::test]
    async fn session_switches_between_nodes() {
        let fx = fixture(&[("video0", None), ("video1", None)]);
        let mut session = CameraSession::new(fx.devices.clone());

        session.start().await.unwrap();
        assert!(session.active_device_id().unwrap().ends_with("video0"));
        assert!(session.stream().unwrap().handle.is_some());

        session.switch_device().await.unwrap();
        assert!(session.active_device_id().unwrap().ends_with("video1"));

        session.stop();
        assert!(session.stream().is_none());
    }

    #[tokio::test]
    async fn metadata_nodes_are_not_capture_inputs() {
        let fx = fixture(&[("video0", Some("UVC Camera")), ("video1", Some("UVC Camera")), ("video2", None)]);
        fx.set_index("video0", 0);
        fx.set_index("video1", 1);

        let devices = fx.devices.enumerate_devices().await.unwrap();
        let kinds: Vec<DeviceKind> = devices.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DeviceKind::VideoInput, DeviceKind::Other, DeviceKind::VideoInput]
        );

        let mut session = CameraSession::new(fx.devices.clone());
        session.start().await.unwrap();
        session.switch_device().await.unwrap();
        assert!(session.active_device_id().unwrap().ends_with("video2"));
    }

    #[test]
    fn busy_errno_maps_to_busy() {
        let err = map_open_error("/dev/video0", io::Error::from_raw_os_error(EBUSY));
        assert!(matches!(err, CameraError::DeviceBusy(_)));
        let err = map_open_error("/dev/video0", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, CameraError::PermissionDenied(_)));
    }
}
