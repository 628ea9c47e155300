use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::models::StudentObservation;

pub const STUDENTS_CSV_FILENAME: &str = "students.csv";
pub const CSV_MIME: &str = "text/csv;charset=utf-8";
pub const ROSTER_HEADERS: [&str; 5] = ["ID", "Student Name", "Focus %", "Attendance %", "Points"];

/// Joins fields verbatim. Fields containing commas or newlines are not escaped,
/// which keeps the output byte-compatible with earlier exports.
pub fn to_csv<H, F>(headers: &[H], rows: &[Vec<F>]) -> String
where
    H: AsRef<str>,
    F: AsRef<str>,
{
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(join_fields(headers));
    for row in rows {
        lines.push(join_fields(row));
    }
    lines.join("\n")
}

fn join_fields<T: AsRef<str>>(fields: &[T]) -> String {
    fields.iter().map(field_str).collect::<Vec<&str>>().join(",")
}

fn field_str<T: AsRef<str>>(field: &T) -> &str {
    field.as_ref()
}

/// RFC 4180 quoting, same `\n` line separator and no trailing newline.
pub fn to_csv_quoted<H, F>(headers: &[H], rows: &[Vec<F>]) -> anyhow::Result<String>
where
    H: AsRef<str>,
    F: AsRef<str>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(headers.iter().map(field_str))?;
    for row in rows {
        writer.write_record(row.iter().map(field_str))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush csv writer: {}", err.error()))?;
    let mut output = String::from_utf8(bytes).context("csv output is not utf-8")?;
    if output.ends_with('\n') {
        output.pop();
    }
    Ok(output)
}

pub fn roster_rows(roster: &[StudentObservation]) -> Vec<Vec<String>> {
    roster
        .iter()
        .map(|student| {
            vec![
                student.id.to_string(),
                student.name.clone(),
                student.focus.to_string(),
                student.attendance.to_string(),
                student.points.to_string(),
            ]
        })
        .collect()
}

/// A CSV payload ready to hand to the user as a file.
#[derive(Debug, Clone)]
pub struct CsvDownload {
    pub filename: &'static str,
    pub mime: &'static str,
    pub body: String,
}

impl CsvDownload {
    pub fn students(roster: &[StudentObservation], quoted: bool) -> anyhow::Result<Self> {
        let rows = roster_rows(roster);
        let body = if quoted {
            to_csv_quoted(&ROSTER_HEADERS, &rows)?
        } else {
            to_csv(&ROSTER_HEADERS, &rows)
        };

        Ok(Self {
            filename: STUDENTS_CSV_FILENAME,
            mime: CSV_MIME,
            body,
        })
    }

    pub fn write_to(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let path = dir.join(self.filename);
        std::fs::write(&path, &self.body)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::demo_roster;

    #[test]
    fn embedded_commas_are_not_escaped() {
        let csv = to_csv(&["ID", "Name"], &[vec!["1001", "A, B"]]);
        assert_eq!(csv, "ID,Name\n1001,A, B");
    }

    #[test]
    fn header_only_when_roster_is_empty() {
        let rows: Vec<Vec<String>> = Vec::new();
        assert_eq!(to_csv(&ROSTER_HEADERS, &rows), "ID,Student Name,Focus %,Attendance %,Points");
    }

    #[test]
    fn student_export_matches_file_contract() {
        let roster = demo_roster();
        let download = CsvDownload::students(&roster[..2], false).unwrap();
        assert_eq!(download.filename, "students.csv");
        assert_eq!(download.mime, "text/csv;charset=utf-8");
        assert_eq!(
            download.body,
            "ID,Student Name,Focus %,Attendance %,Points\n\
             1001,Giacomo Guilizzoni,92,96,91\n\
             1002,Marco Botton,85,88,82"
        );
    }

    #[test]
    fn quoted_variant_escapes_commas_and_quotes() {
        let csv = to_csv_quoted(&["ID", "Name"], &[vec!["1001", "A, B"], vec!["1002", "say \"hi\""]])
            .unwrap();
        assert_eq!(csv, "ID,Name\n1001,\"A, B\"\n1002,\"say \"\"hi\"\"\"");
    }

    #[test]
    fn download_is_written_under_its_filename() {
        let dir = tempfile::tempdir().unwrap();
        let download = CsvDownload::students(&demo_roster(), false).unwrap();
        let path = download.write_to(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "students.csv");
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written.lines().count(), 16);
        assert!(!written.ends_with('\n'));
    }
}
