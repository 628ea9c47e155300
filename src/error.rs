use thiserror::Error;

use crate::models::StudentId;

/// Boundary check failures for externally supplied rosters.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("student {id}: name must not be empty")]
    EmptyName { id: StudentId },

    #[error("student {id}: {field} must be within 0..=100, got {value}")]
    OutOfRange {
        id: StudentId,
        field: &'static str,
        value: f64,
    },

    #[error("duplicate student id {0}")]
    DuplicateId(StudentId),
}

pub type CameraResult<T> = Result<T, CameraError>;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("no video input device available")]
    NoDevice,

    #[error("video device {0} not found")]
    DeviceNotFound(String),

    #[error("video device {0} is busy")]
    DeviceBusy(String),

    #[error("permission denied for video device {0}")]
    PermissionDenied(String),

    #[error("camera is not active")]
    NotActive,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
