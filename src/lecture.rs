use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::camera::{CameraSession, MediaDevices};
use crate::leaderboard;
use crate::models::{LectureStats, LectureSummary, StudentObservation};
use crate::stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LecturePhase {
    Live,
    Ending,
    Ended,
}

/// View-model for a running lecture: derived stats, leaderboard and camera.
pub struct LectureSession<D: MediaDevices> {
    id: Uuid,
    course_id: String,
    started_at: DateTime<Utc>,
    phase: LecturePhase,
    top_limit: usize,
    student_count: usize,
    stats: LectureStats,
    top_performers: Vec<StudentObservation>,
    camera: CameraSession<D>,
}

impl<D: MediaDevices> LectureSession<D> {
    pub fn new(
        course_id: impl Into<String>,
        roster: &[StudentObservation],
        devices: D,
        top_limit: usize,
    ) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            course_id: course_id.into(),
            started_at: Utc::now(),
            phase: LecturePhase::Live,
            top_limit,
            student_count: 0,
            stats: LectureStats::default(),
            top_performers: Vec::new(),
            camera: CameraSession::new(devices),
        };
        session.refresh(roster);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn phase(&self) -> LecturePhase {
        self.phase
    }

    pub fn stats(&self) -> &LectureStats {
        &self.stats
    }

    pub fn top_performers(&self) -> &[StudentObservation] {
        &self.top_performers
    }

    pub fn camera(&self) -> &CameraSession<D> {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraSession<D> {
        &mut self.camera
    }

    /// Recomputes derived values from a fresh roster snapshot.
    pub fn refresh(&mut self, roster: &[StudentObservation]) {
        self.student_count = roster.len();
        self.stats = stats::compute_stats(roster);
        self.top_performers = leaderboard::top_n(roster, self.top_limit)
            .into_iter()
            .cloned()
            .collect();
    }

    /// Stops the camera and waits out the end-of-session delay. Returns `None`
    /// when the lecture is already ending or ended.
    pub async fn end(&mut self, delay: Duration) -> Option<LectureSummary> {
        if self.phase != LecturePhase::Live {
            return None;
        }

        self.phase = LecturePhase::Ending;
        self.camera.stop();
        tokio::time::sleep(delay).await;

        let summary = LectureSummary {
            session_id: self.id,
            course_id: self.course_id.clone(),
            started_at: self.started_at,
            ended_at: Utc::now(),
            student_count: self.student_count,
            stats: self.stats,
        };
        self.phase = LecturePhase::Ended;
        info!(session = %self.id, course = %self.course_id, "lecture ended");
        Some(summary)
    }
}
