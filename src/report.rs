use std::fmt::Write;

use chrono::NaiveDate;

use crate::leaderboard;
use crate::models::{Course, StudentObservation};
use crate::stats::{self, format_percent};

pub fn build_report(
    course: &Course,
    generated_on: NaiveDate,
    roster: &[StudentObservation],
    top_limit: usize,
) -> String {
    let lecture_stats = stats::compute_stats(roster);
    let ranked = leaderboard::rank(roster, top_limit);

    let mut output = String::new();

    let _ = writeln!(output, "# Lecture Report: {} {}", course.id, course.name);
    let _ = writeln!(
        output,
        "Generated {} for {} students",
        generated_on,
        roster.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Class Averages");
    let _ = writeln!(
        output,
        "- Focus: {}",
        format_percent(lecture_stats.average_focus)
    );
    let _ = writeln!(
        output,
        "- Attendance: {}",
        format_percent(lecture_stats.average_attendance)
    );
    let _ = writeln!(output, "- Points: {}", lecture_stats.average_points);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Performers");

    if ranked.is_empty() {
        let _ = writeln!(output, "No students on the roster.");
    } else {
        for entry in ranked.iter() {
            let _ = writeln!(
                output,
                "{}. {} ({} pts)",
                entry.rank, entry.observation.name, entry.observation.points
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Roster");

    if roster.is_empty() {
        let _ = writeln!(output, "No students on the roster.");
    } else {
        let _ = writeln!(output, "| ID | Name | Focus | Attendance | Points |");
        let _ = writeln!(output, "|----|------|-------|------------|--------|");
        for student in roster {
            let _ = writeln!(
                output,
                "| {} | {} | {}% | {}% | {} |",
                student.id, student.name, student.focus, student.attendance, student.points
            );
        }
    }

    output
}
