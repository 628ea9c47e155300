use crate::models::{LectureStats, StudentObservation};

/// Class averages for a roster. An empty roster reports zeros.
pub fn compute_stats(roster: &[StudentObservation]) -> LectureStats {
    if roster.is_empty() {
        return LectureStats::default();
    }

    let count = roster.len() as f64;
    let (focus, attendance, points) = roster.iter().fold((0.0, 0.0, 0.0), |acc, student| {
        (
            acc.0 + student.focus,
            acc.1 + student.attendance,
            acc.2 + f64::from(student.points),
        )
    });

    LectureStats {
        average_focus: round_one_decimal(focus / count),
        average_attendance: round_one_decimal(attendance / count),
        average_points: round_one_decimal(points / count),
    }
}

/// Rounds half away from zero.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}
