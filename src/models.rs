use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier shared by every roster source. Legacy numeric ids convert into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StudentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StudentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u32> for StudentId {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

/// One row of classroom telemetry for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentObservation {
    pub id: StudentId,
    pub name: String,
    pub focus: f64,
    pub attendance: f64,
    pub points: u32,
}

impl StudentObservation {
    pub fn new(
        id: impl Into<StudentId>,
        name: impl Into<String>,
        focus: f64,
        attendance: f64,
        points: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            focus,
            attendance,
            points,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureStats {
    pub average_focus: f64,
    pub average_attendance: f64,
    pub average_points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedEntry<'a> {
    pub rank: usize,
    pub observation: &'a StudentObservation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    pub id: String,
    pub name: String,
}

/// Outcome of a finished lecture, handed to the persistence layer.
#[derive(Debug, Clone, Serialize)]
pub struct LectureSummary {
    pub session_id: Uuid,
    pub course_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub student_count: usize,
    pub stats: LectureStats,
}
