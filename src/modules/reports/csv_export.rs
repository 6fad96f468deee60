//! CSV rendering for report exports.

use schoolhub_core::AppError;
use schoolhub_models::courses::RosterEntry;
use serde::Serialize;

use super::model::{RosterCsvRow, Transcript};

/// Serializes `rows` with a header line taken from the field names.
pub fn to_csv<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row).map_err(AppError::internal)?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::internal(anyhow::anyhow!("Failed to flush CSV: {}", e)))
}

pub fn transcript_csv(transcript: &Transcript) -> Result<Vec<u8>, AppError> {
    to_csv(&transcript.courses)
}

pub fn roster_csv(roster: &[RosterEntry]) -> Result<Vec<u8>, AppError> {
    to_csv(roster.iter().map(|entry| RosterCsvRow {
        student_number: &entry.student_number,
        first_name: &entry.first_name,
        last_name: &entry.last_name,
        email: &entry.email,
        enrolled_at: entry.enrolled_at.format("%Y-%m-%d").to_string(),
    }))
}

/// Download-safe file name stem: ASCII alphanumerics, `-` and `_` only.
pub fn file_stem(raw: &str) -> String {
    let stem: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() { "export".to_string() } else { stem }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use schoolhub_models::enrollments::EnrollmentStatus;
    use schoolhub_models::ids::{EnrollmentId, StudentId};
    use schoolhub_models::reports::TranscriptRow;

    use super::*;

    #[test]
    fn test_roster_csv_has_header_and_rows() {
        let roster = vec![RosterEntry {
            enrollment_id: EnrollmentId::new(),
            student_id: StudentId::new(),
            student_number: "S-001".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            enrolled_at: Utc.with_ymd_and_hms(2025, 2, 3, 10, 0, 0).unwrap(),
        }];

        let csv = String::from_utf8(roster_csv(&roster).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("student_number,first_name,last_name,email,enrolled_at")
        );
        assert_eq!(
            lines.next(),
            Some("S-001,Ada,Lovelace,ada@example.com,2025-02-03")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_transcript_csv_quotes_commas_and_leaves_missing_scores_empty() {
        let transcript = Transcript {
            student_id: StudentId::new(),
            student_number: "S-002".into(),
            student_name: "Grace Hopper".into(),
            gpa: 3.7,
            total_credits: 3,
            courses: vec![TranscriptRow {
                semester_name: Some("Fall 2025".into()),
                course_code: "CS101".into(),
                course_name: "Compilers, Intro".into(),
                credit_hours: 3,
                status: EnrollmentStatus::Active,
                final_score: None,
                final_letter: None,
                grade_points: None,
            }],
            generated_at: Utc::now(),
        };

        let csv = String::from_utf8(transcript_csv(&transcript).unwrap()).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("Fall 2025,CS101,\"Compilers, Intro\",3,"));
        assert!(row.ends_with(",,,"));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("CS 101/../x"), "CS_101____x");
        assert_eq!(file_stem(""), "export");
    }
}
