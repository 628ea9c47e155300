use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::error::ValidationError;
use crate::models::{Course, StudentId, StudentObservation};

pub const DEMO_COURSE_ID: &str = "CSE123";

/// Supplies the roster for a course. Callers treat the result as a read-only snapshot.
#[allow(async_fn_in_trait)]
pub trait RosterSource {
    async fn fetch_roster(&self, course: &str) -> anyhow::Result<Vec<StudentObservation>>;
}

/// Canonical form of a course id as stored and queried: trimmed, uppercase.
pub fn normalize_course_id(id: &str) -> String {
    id.trim().to_ascii_uppercase()
}

pub fn demo_course() -> Course {
    Course {
        id: DEMO_COURSE_ID.to_string(),
        name: "Data Structures & Algorithms".to_string(),
    }
}

pub fn demo_roster() -> Vec<StudentObservation> {
    [
        ("1001", "Giacomo Guilizzoni", 92.0, 96.0, 91),
        ("1002", "Marco Botton", 85.0, 88.0, 82),
        ("1003", "Mariah Maclachlan", 87.0, 93.0, 89),
        ("1004", "Valerie Liberty", 78.0, 85.0, 80),
        ("1005", "Emma Johnson", 85.0, 92.0, 88),
        ("1006", "Liam Smith", 78.0, 89.0, 80),
        ("1007", "Olivia Brown", 90.0, 96.0, 93),
        ("1008", "Noah Davis", 82.0, 85.0, 83),
        ("1009", "Sophia Miller", 91.0, 94.0, 92),
        ("1010", "Lucas Wilson", 76.0, 87.0, 79),
        ("1011", "Isabella Taylor", 88.0, 95.0, 90),
        ("1012", "Ethan Anderson", 83.0, 90.0, 85),
        ("1013", "Mia White", 89.0, 91.0, 86),
        ("1014", "Alexander Martinez", 86.0, 88.0, 84),
        ("1015", "Charlotte Thompson", 80.0, 86.0, 81),
    ]
    .into_iter()
    .map(|(id, name, focus, attendance, points)| {
        StudentObservation::new(id, name, focus, attendance, points)
    })
    .collect()
}

/// Built-in roster used when no other source is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoRoster;

impl RosterSource for DemoRoster {
    async fn fetch_roster(&self, course: &str) -> anyhow::Result<Vec<StudentObservation>> {
        if course.eq_ignore_ascii_case(DEMO_COURSE_ID) {
            Ok(demo_roster())
        } else {
            debug!(course, "demo roster has no students for course");
            Ok(Vec::new())
        }
    }
}

/// Roster loaded from a CSV file. Exported `students.csv` files load as-is.
#[derive(Debug, Clone)]
pub struct CsvRoster {
    path: PathBuf,
}

impl CsvRoster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Deserialize)]
struct CsvRow {
    #[serde(alias = "ID")]
    id: String,
    #[serde(alias = "Student Name")]
    name: String,
    #[serde(alias = "Focus %")]
    focus: f64,
    #[serde(alias = "Attendance %")]
    attendance: f64,
    #[serde(alias = "Points")]
    points: u32,
    #[serde(default)]
    course: Option<String>,
}

impl RosterSource for CsvRoster {
    async fn fetch_roster(&self, course: &str) -> anyhow::Result<Vec<StudentObservation>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .with_context(|| format!("failed to open roster {}", self.path.display()))?;
        let mut roster = Vec::new();

        for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
            let row = result.with_context(|| {
                format!("invalid roster row {} in {}", index + 1, self.path.display())
            })?;

            if let Some(row_course) = row.course.as_deref() {
                if !row_course.eq_ignore_ascii_case(course) {
                    continue;
                }
            }

            roster.push(StudentObservation {
                id: StudentId::from(row.id),
                name: row.name,
                focus: row.focus,
                attendance: row.attendance,
                points: row.points,
            });
        }

        debug!(path = %self.path.display(), count = roster.len(), "loaded csv roster");
        Ok(roster)
    }
}

/// Boundary check for externally supplied rosters.
pub fn validate_roster(roster: &[StudentObservation]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();

    for student in roster {
        if student.name.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                id: student.id.clone(),
            });
        }

        for (field, value) in [("focus", student.focus), ("attendance", student.attendance)] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(ValidationError::OutOfRange {
                    id: student.id.clone(),
                    field,
                    value,
                });
            }
        }

        if !seen.insert(&student.id) {
            return Err(ValidationError::DuplicateId(student.id.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::export::CsvDownload;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn course_ids_are_normalized() {
        assert_eq!(normalize_course_id("cse123"), "CSE123");
        assert_eq!(normalize_course_id("  Cse200 "), "CSE200");
        assert_eq!(normalize_course_id(DEMO_COURSE_ID), DEMO_COURSE_ID);
    }

    #[test]
    fn demo_roster_has_unique_valid_students() {
        let roster = demo_roster();
        assert_eq!(roster.len(), 15);
        assert!(validate_roster(&roster).is_ok());
    }

    #[tokio::test]
    async fn demo_source_only_serves_its_course() {
        assert_eq!(DemoRoster.fetch_roster("cse123").await.unwrap().len(), 15);
        assert!(DemoRoster.fetch_roster("CSE999").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn csv_source_filters_by_course_column() {
        let file = write_csv(
            "id,name,focus,attendance,points,course\n\
             1001,Ada Lovelace,90,95,88,CSE123\n\
             2001,Alan Turing,85,90,92,CSE200\n",
        );
        let roster = CsvRoster::new(file.path()).fetch_roster("CSE123").await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id.as_str(), "1001");
        assert_eq!(roster[0].points, 88);
    }

    #[tokio::test]
    async fn exported_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = CsvDownload::students(&demo_roster(), false)
            .unwrap()
            .write_to(dir.path())
            .unwrap();
        let roster = CsvRoster::new(path).fetch_roster(DEMO_COURSE_ID).await.unwrap();
        assert_eq!(roster, demo_roster());
    }

    #[tokio::test]
    async fn malformed_row_is_reported() {
        let file = write_csv("id,name,focus,attendance,points\n1001,Ada,high,95,88\n");
        let err = CsvRoster::new(file.path()).fetch_roster(DEMO_COURSE_ID).await.unwrap_err();
        assert!(err.to_string().contains("invalid roster row 1"));
    }

    #[test]
    fn validation_names_the_offending_field() {
        let roster = vec![StudentObservation::new("1001", "Ada", 101.0, 90.0, 10)];
        assert_eq!(
            validate_roster(&roster),
            Err(ValidationError::OutOfRange {
                id: StudentId::from("1001"),
                field: "focus",
                value: 101.0,
            })
        );

        let roster = vec![StudentObservation::new("1001", "Ada", 90.0, f64::NAN, 10)];
        let err = validate_roster(&roster).unwrap_err();
        assert!(err.to_string().contains("attendance"));
    }

    #[test]
    fn validation_rejects_duplicates_and_blank_names() {
        let roster = vec![
            StudentObservation::new("1001", "Ada", 90.0, 90.0, 10),
            StudentObservation::new("1001", "Alan", 80.0, 80.0, 20),
        ];
        assert_eq!(
            validate_roster(&roster),
            Err(ValidationError::DuplicateId(StudentId::from("1001")))
        );

        let roster = vec![StudentObservation::new(1002u32, "  ", 90.0, 90.0, 10)];
        assert!(matches!(
            validate_roster(&roster),
            Err(ValidationError::EmptyName { .. })
        ));
    }

    #[test]
    fn empty_roster_is_valid() {
        assert!(validate_roster(&[]).is_ok());
    }
}
